use anyhow::{Result, anyhow};
use log::{info, warn};
use pico_args::Arguments;
use std::{
    env,
    process::Command,
    sync::{Arc, atomic::AtomicBool},
    thread,
    time::{Duration, Instant},
};

use crate::actions::{ActionSink, MouseButton, NoopSink, UinputSink};
use crate::config::{DaemonConfigState, Profile, parse_override};
use crate::ipc::runtime::{LOOP_EXIT_WAIT, StopSignals, await_frame_loop};
use crate::ipc::{self, LoopControl, Pipeline};
use crate::source::{JsonLinesSource, SourceError};

const DEFAULT_REPLAY_FPS: u32 = 30;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        let source: Option<String> = pargs.opt_value_from_str("--source")?;
        return ipc::run_daemon(source);
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let source: Option<String> = pargs.opt_value_from_str("--source")?;
            let name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let sets: Vec<String> = pargs.values_from_str("--set")?;
            let profile = resolve_profile(name.as_deref(), &sets)?;
            run_foreground(profile, source)
        }

        Some("replay") => {
            let name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let fps: u32 = pargs
                .opt_value_from_str("--fps")?
                .unwrap_or(DEFAULT_REPLAY_FPS);
            let sets: Vec<String> = pargs.values_from_str("--set")?;
            let file: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl replay <file> [--fps N] [--set k=v]..."))?;
            let mut profile = match name {
                Some(n) => DaemonConfigState::load_or_install_default()?.load_named(&n)?,
                None => Profile::default(),
            };
            apply_sets(&mut profile, &sets)?;
            replay(profile, &file, fps)
        }

        Some("start") => {
            let source: Option<String> = pargs.opt_value_from_str("--source")?;
            let exe = std::env::current_exe()?;
            let mut cmd = Command::new(exe);
            cmd.arg("--daemon");
            if let Some(s) = source {
                cmd.arg("--source").arg(s);
            }
            let child = cmd.spawn()?;
            println!("handctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(serde_json::json!({"op":"shutdown"})),
        Some("status") => request(serde_json::json!({"op":"status"})),
        Some("reload") => request(serde_json::json!({"op":"reload"})),
        Some("list") => request(serde_json::json!({"op":"list"})),
        Some("doctor") => request(serde_json::json!({"op":"doctor"})),
        Some("dictate") => request(serde_json::json!({"op":"dictate"})),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl use <profile_name>"))?;
            request(serde_json::json!({"op":"use","profile":name}))
        }

        Some("config") => {
            let name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let sets: Vec<String> = pargs.values_from_str("--set")?;
            let profile = resolve_profile(name.as_deref(), &sets)?;
            for (k, v) in profile.flatten()? {
                println!("{k} = {v}");
            }
            Ok(())
        }

        Some("emit") => {
            let what: String = pargs.free_from_str().map_err(|_| {
                anyhow!("usage: handctl emit <click|press|release|double|scroll|move|volume|mute|media|type> ...")
            })?;
            emit(&what, &mut pargs)
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// Active (or named) profile with `--set` overrides on top.
fn resolve_profile(name: Option<&str>, sets: &[String]) -> Result<Profile> {
    let cfg = DaemonConfigState::load_or_install_default()?;
    let mut profile = match name {
        Some(n) => cfg.load_named(n)?,
        None => cfg.profile,
    };
    apply_sets(&mut profile, sets)?;
    Ok(profile)
}

fn apply_sets(profile: &mut Profile, sets: &[String]) -> Result<()> {
    let pairs = sets
        .iter()
        .map(|s| parse_override(s))
        .collect::<Result<Vec<_>>>()?;
    profile.apply_overrides(&pairs)
}

fn run_foreground(profile: Profile, source: Option<String>) -> Result<()> {
    let path = source.unwrap_or_else(|| profile.source.path.clone());
    let src = JsonLinesSource::open(&path)?;
    let stop = Arc::new(AtomicBool::new(false));
    let signals = StopSignals::install(stop)?;

    let screen = profile.screen.as_tuple();
    let sink = UinputSink::new(screen).unwrap_or_else(|e| {
        warn!("uinput unavailable ({e}); running in NO-OP mode");
        UinputSink::noop(screen)
    });
    info!("run: profile '{}', landmarks from {path}", profile.meta.name);
    let pipeline = Pipeline::new(profile, src, sink).with_native_dictation();
    let ctl = LoopControl::new(signals.flag());
    let frame_loop = thread::spawn(move || pipeline.run(ctl));
    let Some(result) = await_frame_loop(frame_loop, &signals.flag(), LOOP_EXIT_WAIT) else {
        return Ok(());
    };
    let summary = result?;
    info!(
        "run: {} frames, {} skipped lines, {} failed actions{}",
        summary.frames,
        summary.skipped_lines,
        summary.failed_actions,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}

/// Dry run on a synthetic clock: one frame every `1/fps` seconds.
fn replay(profile: Profile, file: &str, fps: u32) -> Result<()> {
    if fps == 0 {
        return Err(anyhow!("--fps must be positive"));
    }
    let interval = Duration::from_secs(1) / fps;
    let mut pipeline = Pipeline::new(profile, JsonLinesSource::open(file)?, NoopSink);
    let start = Instant::now();
    let mut frame: u32 = 0;
    loop {
        match pipeline.step(start + interval * frame) {
            Ok(Some(outcome)) => {
                for action in &outcome.actions {
                    print_action(outcome.status.frame, action)?;
                }
            }
            Ok(None) => break,
            Err(SourceError::Parse { line, message }) => {
                warn!("replay: skipping line {line}: {message}")
            }
            Err(e) => return Err(e.into()),
        }
        frame += 1;
    }
    let last = pipeline.session().status().frame;
    for action in pipeline.finish() {
        print_action(last, &action)?;
    }
    Ok(())
}

fn print_action(frame: u64, action: &crate::actions::Action) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(&serde_json::json!({"frame": frame, "action": action}))?
    );
    Ok(())
}

fn emit(what: &str, pargs: &mut Arguments) -> Result<()> {
    let screen = DaemonConfigState::load_or_install_default()
        .map(|c| c.profile.screen.as_tuple())
        .unwrap_or_else(|_| Profile::default().screen.as_tuple());
    let mut sink = UinputSink::new(screen)?;
    match what {
        "click" | "press" | "release" => {
            let btn: MouseButton = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit {what} <left|right>"))?;
            if what != "release" {
                sink.press(btn)?;
            }
            if what != "press" {
                sink.release(btn)?;
            }
            println!("ok: {what} {}", btn.as_str());
        }
        "double" => {
            sink.double_click()?;
            println!("ok: double click");
        }
        "scroll" => {
            let steps: i32 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit scroll <steps>"))?;
            sink.scroll(steps)?;
            println!("ok: scrolled {steps}");
        }
        "move" => {
            let usage = || anyhow!("usage: handctl emit move <x> <y>");
            let x: i32 = pargs.free_from_str().map_err(|_| usage())?;
            let y: i32 = pargs.free_from_str().map_err(|_| usage())?;
            sink.move_to(x, y)?;
            println!("ok: moved to {x},{y}");
        }
        "volume" => {
            let dir: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit volume <up|down> [step]"))?;
            let step: u8 = pargs.opt_free_from_str()?.unwrap_or(Profile::default().volume.step);
            match dir.as_str() {
                "up" => sink.volume_up(step)?,
                "down" => sink.volume_down(step)?,
                other => return Err(anyhow!("unknown volume direction: {other}")),
            }
            println!("ok: volume {dir} {step}%");
        }
        "mute" => {
            sink.mute_toggle()?;
            println!("ok: mute toggled");
        }
        "media" => {
            sink.media_play_pause()?;
            println!("ok: play/pause");
        }
        "type" => {
            let text: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit type <text>"))?;
            sink.type_text(&text)?;
            println!("ok: typed {} chars", text.chars().count());
        }
        other => return Err(anyhow!("unknown emit kind: {other}")),
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"handctl: hand-gesture pointer and media control

USAGE:
  handctl help [command]                    Show general or command-specific help
  handctl run [--source PATH] [--profile NAME] [--set k=v]...
                                            Run a session in the foreground
  handctl replay <file> [--fps N] [--profile NAME] [--set k=v]...
                                            Print the actions a recording produces
  handctl start [--source PATH]             Start the daemon
  handctl stop                              Stop the daemon
  handctl status                            Show daemon and session state
  handctl reload                            Reload active profile
  handctl use <name>                        Switch active profile
  handctl list                              List profiles
  handctl doctor                            Diagnose permissions and helpers
  handctl dictate                           Start one dictation
  handctl config [--profile NAME] [--set k=v]...
                                            Print resolved settings
  handctl emit <kind> ...                   Emit one input event (see `help emit`)

ENVIRONMENT:
  HANDCTL_LOG                               Log filter (default: info)

TIPS:
  - Landmarks arrive as JSON lines on stdin, a file, or a FIFO
  - Profiles: ~/.config/handctl/profiles
  - Active profile pointer: ~/.config/handctl/active
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: handctl run [--source PATH] [--profile NAME] [--set k=v]...\nRuns the gesture session in the foreground until the source ends or Ctrl-C."
        ),
        "replay" => println!(
            "usage: handctl replay <file> [--fps N] [--profile NAME] [--set k=v]...\nFeeds a recording through a dry-run session and prints one JSON line per action.\nUses built-in defaults unless --profile is given; frames are spaced 1/fps apart (default 30)."
        ),
        "start" => println!(
            "usage: handctl start [--source PATH]\nStarts the background daemon."
        ),
        "stop" => println!("usage: handctl stop\nStops the running daemon; held buttons are released."),
        "status" => println!(
            "usage: handctl status\nShows active profile, landmark source, latches and per-hand gestures."
        ),
        "reload" => println!(
            "usage: handctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: handctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: handctl list\nLists available profiles."),
        "doctor" => println!(
            "usage: handctl doctor\nChecks /dev/uinput, input group, pactl and the dictation command."
        ),
        "dictate" => println!(
            "usage: handctl dictate\nRequests one dictation, as the left-hand thumb-pinky pinch does."
        ),
        "config" => println!(
            "usage: handctl config [--profile NAME] [--set k=v]...\nPrints every setting as section.key = value."
        ),
        "emit" => println!(
            "usage:\n  handctl emit click|press|release <left|right>\n  handctl emit double\n  handctl emit scroll <steps>\n  handctl emit move <x> <y>\n  handctl emit volume <up|down> [step]\n  handctl emit mute\n  handctl emit media\n  handctl emit type <text>"
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    if r.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let msg = r.get("error").and_then(|v| v.as_str()).unwrap_or("request failed");
        return Err(anyhow!("daemon: {msg}"));
    }
    Ok(())
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
