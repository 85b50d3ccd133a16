use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::{DaemonEvent, LoopControl, Pipeline, PipelineCommand};
use super::runtime::{LOOP_EXIT_WAIT, StopSignals, await_frame_loop, socket_path};
use crate::actions::UinputSink;
use crate::config::DaemonConfigState;
use crate::session::SessionStatus;
use crate::source::JsonLinesSource;

pub fn run_daemon(source_override: Option<String>) -> Result<()> {
    // state and source first: a failure here must not leave a socket behind
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.cfg.active_name);
    let source_path = source_override.unwrap_or_else(|| state.cfg.profile.source.path.clone());
    state.source = source_path.clone();
    let source = JsonLinesSource::open(&source_path)?;

    // socket
    let (sock, listener) = SocketFile::bind(socket_path()?)?;
    info!("daemon: listening on {}", sock.path().display());

    let stop = Arc::new(AtomicBool::new(false));
    let _signals = StopSignals::install(stop.clone())?;

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();
    let (tx_cmd, rx_cmd) = mpsc::channel::<PipelineCommand>();

    // frame loop
    let screen = state.cfg.profile.screen.as_tuple();
    let sink = UinputSink::new(screen).unwrap_or_else(|e| {
        warn!("uinput unavailable ({e}); running in NO-OP mode");
        UinputSink::noop(screen)
    });
    let pipeline = Pipeline::new(state.cfg.profile.clone(), source, sink).with_native_dictation();
    let ctl = LoopControl {
        stop: stop.clone(),
        commands: Some(rx_cmd),
        events: Some(tx_evt),
    };
    let frame_loop = thread::spawn(move || {
        if let Err(e) = pipeline.run(ctl) {
            error!("frame loop failed: {e:#}");
        }
    });
    info!("daemon: reading landmarks from {source_path}");

    // profile watcher
    let _watcher = match watch_profiles(&state.cfg, tx_req.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile watcher unavailable: {e}");
            None
        }
    };

    // accept loop
    listener.set_nonblocking(true)?;
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx_req.clone();
                let st_snapshot = state.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, st_snapshot, tx) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(_) => {}
        }

        while let Ok(evt) = rx_evt.try_recv() {
            match evt {
                DaemonEvent::Status(s) => state.status = Some(s),
                DaemonEvent::Stopped { summary, error } => {
                    info!(
                        "daemon: frame loop ended after {} frames ({} skipped lines, {} failed actions)",
                        summary.frames, summary.skipped_lines, summary.failed_actions
                    );
                    if let Some(e) = error {
                        error!("daemon: landmark source failed: {e}");
                    }
                    stop.store(true, Ordering::SeqCst);
                }
            }
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => match state.cfg.reload() {
                    Ok(()) => {
                        let _ = tx_cmd.send(PipelineCommand::Reload(Box::new(
                            state.cfg.profile.clone(),
                        )));
                        info!("profile reloaded");
                    }
                    Err(e) => error!("reload failed, keeping last good profile: {e}"),
                },
                IpcMsg::UseProfile(name) => match state.cfg.set_active(&name) {
                    Ok(()) => {
                        let _ = tx_cmd.send(PipelineCommand::Reload(Box::new(
                            state.cfg.profile.clone(),
                        )));
                        info!("switched active profile to {}", state.cfg.active_name);
                    }
                    Err(e) => error!("use profile failed: {e}"),
                },
                IpcMsg::Dictate => {
                    let _ = tx_cmd.send(PipelineCommand::Dictate);
                }
                IpcMsg::Shutdown => {
                    info!("daemon: shutdown requested");
                    stop.store(true, Ordering::SeqCst);
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }

    drop(tx_cmd);
    await_frame_loop(frame_loop, &stop, LOOP_EXIT_WAIT);
    drop(sock);
    info!("daemon: stopped");
    Ok(())
}

/// The daemon's socket file, unlinked on drop whichever way the daemon exits.
struct SocketFile(PathBuf);

impl SocketFile {
    /// Binds `path`, replacing a stale socket left by a crashed daemon.
    fn bind(path: PathBuf) -> Result<(Self, UnixListener)> {
        if path.exists() {
            let _ = std::fs::remove_file(&path);
        }
        let listener = UnixListener::bind(&path)?;
        Ok((Self(path), listener))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Sends a reload whenever a profile file is written.
fn watch_profiles(cfg: &DaemonConfigState, tx: Sender<IpcMsg>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let relevant = event.kind.is_modify() || event.kind.is_create();
            if relevant && event.paths.iter().any(|p| is_profile_path(p)) {
                debug!("profile change: {:?}", event.paths);
                let _ = tx.send(IpcMsg::Reload);
            }
        }
        Err(e) => warn!("profile watcher: {e}"),
    })?;
    watcher.watch(&cfg.profiles_dir, RecursiveMode::NonRecursive)?;
    info!("daemon: watching {}", cfg.profiles_dir.display());
    Ok(watcher)
}

fn is_profile_path(p: &Path) -> bool {
    p.extension().is_some_and(|ext| ext == "toml")
}

fn handle_client(mut stream: UnixStream, st: DaemonState, tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => serde_json::json!({"ok": true, "data": {
            "active_profile": st.cfg.active_name,
            "socket": socket_path().ok(),
            "source": st.source,
            "session": st.status,
        }}),
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": st.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            if name.is_empty() {
                serde_json::json!({"ok": false, "error": "missing profile name"})
            } else if !st.cfg.list_profiles().iter().any(|p| p == name) {
                serde_json::json!({"ok": false, "error": format!("profile not found: {name}")})
            } else {
                let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
                serde_json::json!({"ok": true, "data": {"active_profile": name}})
            }
        }
        "list" => {
            let list = st.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "doctor" => {
            let report = st.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "dictate" => {
            if st.cfg.profile.dictation.enabled {
                let _ = tx_req.send(IpcMsg::Dictate);
                serde_json::json!({"ok": true, "data": "dictation requested"})
            } else {
                serde_json::json!({"ok": false, "error": "dictation is disabled in the active profile"})
            }
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

#[derive(Clone)]
struct DaemonState {
    cfg: DaemonConfigState,
    source: String,
    status: Option<SessionStatus>,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        Ok(Self {
            cfg,
            source: String::new(),
            status: None,
        })
    }
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    Dictate,
    Shutdown,
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "handctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
