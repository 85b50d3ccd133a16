use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, Sender, TryRecvError},
    },
    time::{Duration, Instant},
};

use super::dispatch::dispatch_actions;
use crate::actions::{Action, ActionSink, UinputSink};
use crate::config::Profile;
use crate::dictation::{CommandTranscriber, DictationWorker};
use crate::session::{FrameOutcome, Session, SessionStatus};
use crate::source::{LandmarkSource, SourceError};

const DICTATION_STOP_WAIT: Duration = Duration::from_secs(2);

/// Daemon → frame loop.
#[derive(Debug)]
pub enum PipelineCommand {
    Reload(Box<Profile>),
    Dictate,
}

/// Frame loop → daemon.
#[derive(Debug)]
pub enum DaemonEvent {
    Status(SessionStatus),
    Stopped {
        summary: RunSummary,
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub skipped_lines: u64,
    pub failed_actions: u64,
    /// Ended by a stop request rather than end of stream.
    pub interrupted: bool,
}

pub struct LoopControl {
    pub stop: Arc<AtomicBool>,
    pub commands: Option<Receiver<PipelineCommand>>,
    pub events: Option<Sender<DaemonEvent>>,
}

impl LoopControl {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self {
            stop,
            commands: None,
            events: None,
        }
    }

    fn emit(&self, evt: DaemonEvent) {
        if let Some(tx) = &self.events {
            // receiver gone means nobody is listening
            let _ = tx.send(evt);
        }
    }
}

type DictationFactory = fn(&Profile) -> Option<DictationWorker>;

/// One session driven by one landmark source into one sink.
pub struct Pipeline<S: LandmarkSource, K: ActionSink> {
    profile: Profile,
    session: Session,
    source: S,
    sink: K,
    dictation: Option<DictationWorker>,
    spawn_dictation: Option<DictationFactory>,
    summary: RunSummary,
}

impl<S: LandmarkSource, K: ActionSink> Pipeline<S, K> {
    pub fn new(profile: Profile, source: S, sink: K) -> Self {
        Self {
            session: Session::new(&profile),
            profile,
            source,
            sink,
            dictation: None,
            spawn_dictation: None,
            summary: RunSummary::default(),
        }
    }

    /// Runs transcription on a native worker, respawned when a reload
    /// changes the dictation settings.
    pub fn with_native_dictation(mut self) -> Self {
        self.spawn_dictation = Some(native_dictation);
        self.dictation = native_dictation(&self.profile);
        self
    }

    pub fn with_dictation(mut self, worker: DictationWorker) -> Self {
        self.dictation = Some(worker);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn apply_profile(&mut self, profile: Profile) {
        self.session.apply_profile(&profile);
        if let Some(spawn) = self.spawn_dictation {
            if profile.dictation != self.profile.dictation {
                if let Some(mut old) = self.dictation.take() {
                    old.stop(DICTATION_STOP_WAIT);
                }
                self.dictation = spawn(&profile);
            }
        }
        info!("pipeline: profile '{}' applied", profile.meta.name);
        self.profile = profile;
    }

    pub fn request_dictation(&self) {
        match &self.dictation {
            Some(worker) => {
                worker.request();
            }
            None => info!("dictation is disabled in the active profile"),
        }
    }

    /// Reads one frame, runs the session and dispatches its actions.
    /// `Ok(None)` at end of stream.
    pub fn step(&mut self, now: Instant) -> Result<Option<FrameOutcome>, SourceError> {
        let Some(hands) = self.source.next_frame()? else {
            return Ok(None);
        };
        let outcome = self.session.process_frame(&hands, now);
        self.summary.frames += 1;
        self.summary.failed_actions +=
            dispatch_actions(&outcome.actions, &mut self.sink, self.dictation.as_ref()) as u64;
        Ok(Some(outcome))
    }

    /// Releases held buttons and stops the dictation worker. Returns the
    /// releases that were dispatched.
    pub fn finish(&mut self) -> Vec<Action> {
        let releases = self.session.release_all();
        if !releases.is_empty() {
            info!("pipeline: releasing {} held button(s)", releases.len());
        }
        self.summary.failed_actions += dispatch_actions(&releases, &mut self.sink, None) as u64;
        if let Some(mut worker) = self.dictation.take() {
            worker.stop(DICTATION_STOP_WAIT);
        }
        releases
    }

    /// Frame loop. Malformed lines are skipped with a warning; any other
    /// source error ends the loop after the usual cleanup.
    pub fn run(mut self, ctl: LoopControl) -> Result<RunSummary> {
        let mut error = None;
        loop {
            if ctl.stop.load(Ordering::SeqCst) {
                self.summary.interrupted = true;
                break;
            }
            if !self.drain_commands(&ctl) {
                break;
            }
            match self.step(Instant::now()) {
                Ok(Some(outcome)) => ctl.emit(DaemonEvent::Status(outcome.status)),
                Ok(None) => {
                    info!("pipeline: landmark source ended");
                    break;
                }
                Err(SourceError::Parse { line, message }) => {
                    warn!("pipeline: skipping line {line}: {message}");
                    self.summary.skipped_lines += 1;
                }
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        self.finish();
        let summary = self.summary;
        // source is dropped last
        drop(self);
        ctl.emit(DaemonEvent::Stopped {
            summary,
            error: error.as_ref().map(|e| e.to_string()),
        });
        match error {
            Some(e) => Err(e.into()),
            None => Ok(summary),
        }
    }

    /// False once the command channel is closed and the stop flag is set.
    fn drain_commands(&mut self, ctl: &LoopControl) -> bool {
        let Some(rx) = &ctl.commands else {
            return true;
        };
        loop {
            match rx.try_recv() {
                Ok(PipelineCommand::Reload(profile)) => self.apply_profile(*profile),
                Ok(PipelineCommand::Dictate) => self.request_dictation(),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    debug!("pipeline: command channel closed");
                    return !ctl.stop.load(Ordering::SeqCst);
                }
            }
        }
    }
}

/// Worker backed by the configured command, typing through its own virtual
/// device. `None` when dictation is off or cannot start.
pub fn native_dictation(profile: &Profile) -> Option<DictationWorker> {
    if !profile.dictation.enabled {
        return None;
    }
    let transcriber = match CommandTranscriber::from_settings(&profile.dictation) {
        Ok(t) => t,
        Err(e) => {
            warn!("dictation unavailable: {e:#}");
            return None;
        }
    };
    let screen = profile.screen.as_tuple();
    let sink = UinputSink::new(screen).unwrap_or_else(|e| {
        warn!("dictation: uinput unavailable ({e}); typing disabled");
        UinputSink::noop(screen)
    });
    Some(DictationWorker::spawn(transcriber, sink, &profile.dictation))
}
