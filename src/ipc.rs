//! Daemon process: control socket, frame loop, and action dispatch.

pub mod dispatch;
pub mod pipeline;
pub mod runtime;
pub mod server;

pub use pipeline::{DaemonEvent, LoopControl, Pipeline, PipelineCommand, RunSummary};
pub use server::{client_request, run_daemon};
