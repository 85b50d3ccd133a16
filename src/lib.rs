//! Hand-landmark driven pointer and media control.
//!
//! Landmark frames from an external pose estimator flow through
//! [`gestures`] and [`session`] into [`actions::Action`]s, which a sink turns
//! into virtual input events.

pub mod actions;
pub mod cli;
pub mod config;
pub mod dictation;
pub mod edge;
pub mod geometry;
pub mod gestures;
pub mod ipc;
pub mod landmarks;
pub mod logging;
pub mod mapping;
pub mod pointer;
pub mod scroll;
pub mod session;
pub mod source;
pub mod stability;
pub mod volume;
