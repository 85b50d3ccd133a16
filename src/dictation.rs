//! Speech-to-text typing on a background worker.
//!
//! The frame loop must never block on transcription, so requests go through a
//! single-slot mailbox: one request may wait while idle, repeats coalesce, and
//! requests made while a transcription is running are dropped. The worker
//! sleeps on a condvar between jobs.

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use serde::Serialize;
use std::{
    io::Read,
    process::{Command, Stdio},
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::actions::ActionSink;
use crate::config::DictationSettings;

const CHILD_POLL: Duration = Duration::from_millis(20);

pub trait Transcriber: Send {
    /// Listens and returns the recognised text; `None` when nothing was heard.
    fn transcribe(&mut self, timeout: Duration) -> Result<Option<String>>;
}

/// Runs an external program and takes its trimmed stdout as the transcript.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    argv: Vec<String>,
}

impl CommandTranscriber {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(anyhow!("dictation command is empty"));
        }
        Ok(Self { argv })
    }

    pub fn from_settings(settings: &DictationSettings) -> Result<Self> {
        Self::new(settings.command.clone())
    }
}

impl Transcriber for CommandTranscriber {
    fn transcribe(&mut self, timeout: Duration) -> Result<Option<String>> {
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning {}", self.argv[0]))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("no stdout from {}", self.argv[0]))?;
        let reader = thread::spawn(move || {
            let mut s = String::new();
            stdout.read_to_string(&mut s).map(|_| s)
        });

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                // grandchildren may still hold the pipe; leave the reader detached
                drop(reader);
                return Err(anyhow!("{} timed out after {timeout:?}", self.argv[0]));
            }
            thread::sleep(CHILD_POLL);
        };

        let text = reader
            .join()
            .map_err(|_| anyhow!("stdout reader panicked"))??;
        if !status.success() {
            return Err(anyhow!("{} exited with {status}", self.argv[0]));
        }
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DictationState {
    Idle,
    Pending,
    Busy,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Queued,
    Coalesced,
    Dropped,
}

struct Inner {
    state: DictationState,
    exited: bool,
}

struct Mailbox {
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: DictationState::Idle,
                exited: false,
            }),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn request(&self) -> RequestOutcome {
        let mut inner = self.lock();
        match inner.state {
            DictationState::Idle => {
                inner.state = DictationState::Pending;
                self.cv.notify_all();
                RequestOutcome::Queued
            }
            DictationState::Pending => RequestOutcome::Coalesced,
            DictationState::Busy | DictationState::Stopping => RequestOutcome::Dropped,
        }
    }

    /// Blocks until there is work. False means stop.
    fn take(&self) -> bool {
        let mut inner = self.lock();
        loop {
            match inner.state {
                DictationState::Pending => {
                    inner.state = DictationState::Busy;
                    return true;
                }
                DictationState::Stopping => return false,
                DictationState::Idle | DictationState::Busy => {
                    inner = self.cv.wait(inner).unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    fn finish_job(&self) {
        let mut inner = self.lock();
        if inner.state == DictationState::Busy {
            inner.state = DictationState::Idle;
        }
    }

    fn mark_exited(&self) {
        self.lock().exited = true;
        self.cv.notify_all();
    }
}

pub struct DictationWorker {
    mailbox: Arc<Mailbox>,
    handle: Option<JoinHandle<()>>,
}

impl DictationWorker {
    pub fn spawn<T, S>(transcriber: T, sink: S, settings: &DictationSettings) -> Self
    where
        T: Transcriber + 'static,
        S: ActionSink + Send + 'static,
    {
        let mailbox = Arc::new(Mailbox::new());
        let mb = mailbox.clone();
        let timeout = Duration::from_secs(settings.timeout_secs);
        let auto_enter = settings.auto_enter;
        let handle = thread::spawn(move || {
            worker_loop(&mb, transcriber, sink, timeout, auto_enter);
            mb.mark_exited();
        });
        Self {
            mailbox,
            handle: Some(handle),
        }
    }

    pub fn request(&self) -> RequestOutcome {
        let outcome = self.mailbox.request();
        match outcome {
            RequestOutcome::Queued => info!("dictation: queued"),
            RequestOutcome::Coalesced => info!("dictation: already pending"),
            RequestOutcome::Dropped => warn!("dictation: busy, request dropped"),
        }
        outcome
    }

    pub fn state(&self) -> DictationState {
        self.mailbox.lock().state
    }

    /// Asks the worker to exit and waits up to `timeout`. Returns whether it
    /// exited in time; a worker still transcribing is left to finish detached.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let mb = &self.mailbox;
        let guard = {
            let mut inner = mb.lock();
            inner.state = DictationState::Stopping;
            mb.cv.notify_all();
            inner
        };
        let (inner, _) = mb
            .cv
            .wait_timeout_while(guard, timeout, |i| !i.exited)
            .unwrap_or_else(|e| e.into_inner());
        let exited = inner.exited;
        drop(inner);

        if exited {
            if let Some(h) = self.handle.take() {
                let _ = h.join();
            }
        } else {
            warn!("dictation: worker still busy after {timeout:?}; detaching");
            self.handle.take();
        }
        exited
    }
}

impl Drop for DictationWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop(Duration::ZERO);
        }
    }
}

fn worker_loop<T: Transcriber, S: ActionSink>(
    mailbox: &Mailbox,
    mut transcriber: T,
    mut sink: S,
    timeout: Duration,
    auto_enter: bool,
) {
    while mailbox.take() {
        match transcriber.transcribe(timeout) {
            Ok(Some(text)) => {
                info!("dictation: typing {} chars", text.chars().count());
                let text = if auto_enter { format!("{text}\n") } else { text };
                if let Err(e) = sink.type_text(&text) {
                    error!("dictation: typing failed: {e}");
                }
            }
            Ok(None) => info!("dictation: nothing heard"),
            Err(e) => error!("dictation: transcription failed: {e:#}"),
        }
        mailbox.finish_job();
    }
}
