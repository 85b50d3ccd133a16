use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::warn;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// How long a stop request waits for a frame loop stuck in a blocking read.
pub const LOOP_EXIT_WAIT: Duration = Duration::from_secs(3);

pub fn runtime_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let dir = dirs.home_dir().join(".local").join("run");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn socket_path() -> Result<PathBuf> {
    Ok(runtime_dir()?.join("handctl.sock"))
}

/// SIGINT/SIGTERM flip a shared stop flag instead of killing the process, so
/// the frame loop can release held buttons on its way out.
pub struct StopSignals {
    flag: Arc<AtomicBool>,
    handle: Handle,
    thread: Option<thread::JoinHandle<()>>,
}

impl StopSignals {
    pub fn install(flag: Arc<AtomicBool>) -> Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let f = flag.clone();
        let thread = thread::spawn(move || {
            for signal in signals.forever() {
                warn!("signal {signal} received, stopping");
                f.store(true, Ordering::SeqCst);
            }
        });
        Ok(Self {
            flag,
            handle,
            thread: Some(thread),
        })
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }
}

impl Drop for StopSignals {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Waits for the frame loop thread. Once `stop` is set the loop gets `grace`
/// to finish; one still blocked on a silent source after that is abandoned
/// and `None` is returned. The kernel drops the virtual device, and any
/// button it still holds, when the process exits.
pub fn await_frame_loop<T>(handle: JoinHandle<T>, stop: &AtomicBool, grace: Duration) -> Option<T> {
    let mut deadline = None;
    while !handle.is_finished() {
        if stop.load(Ordering::SeqCst) {
            let d = *deadline.get_or_insert_with(|| Instant::now() + grace);
            if Instant::now() >= d {
                warn!("frame loop still waiting for input; exiting without it");
                return None;
            }
        }
        thread::sleep(Duration::from_millis(10));
    }
    handle.join().ok()
}
