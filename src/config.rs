use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::mapping::ActiveArea;
use crate::pointer::ResponseCurve;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub name: String,
    pub allow_commands: bool,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            name: "default".into(),
            allow_commands: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn camera() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }

    pub fn screen() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }

    pub fn as_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// File or FIFO of landmark frames; "-" is stdin.
    pub path: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self { path: "-".into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    pub pinch_threshold: f32,
    pub stable_frames: usize,
    pub global_pause_distance: f32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            pinch_threshold: 20.0,
            stable_frames: 10,
            global_pause_distance: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerSettings {
    pub ema_min: f64,
    pub ema_max: f64,
    pub speed_min: f64,
    pub speed_max: f64,
    pub curve: ResponseCurve,
    pub sigmoid_steepness: f64,
    pub sigmoid_midpoint: f64,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            ema_min: 0.01,
            ema_max: 0.6,
            speed_min: 10.0,
            speed_max: 350.0,
            curve: ResponseCurve::Sigmoid,
            sigmoid_steepness: 0.05,
            sigmoid_midpoint: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollSettings {
    /// Screen pixels per scroll notch.
    pub sensitivity: f32,
    pub threshold: i32,
    pub cooldown_ms: u64,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            sensitivity: 20.0,
            threshold: 15,
            cooldown_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Percent per step.
    pub step: u8,
    pub dead_band: i32,
    pub cooldown_ms: u64,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            step: 4,
            dead_band: 30,
            cooldown_ms: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationSettings {
    pub enabled: bool,
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub auto_enter: bool,
}

impl Default for DictationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            command: Vec::new(),
            timeout_secs: 5,
            auto_enter: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub meta: Meta,
    pub camera: Resolution,
    pub screen: Resolution,
    pub source: SourceSettings,
    pub gesture: GestureSettings,
    pub pointer: PointerSettings,
    pub active_area: ActiveArea,
    pub scroll: ScrollSettings,
    pub volume: VolumeSettings,
    pub dictation: DictationSettings,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            meta: Meta::default(),
            camera: Resolution::camera(),
            screen: Resolution::screen(),
            source: SourceSettings::default(),
            gesture: GestureSettings::default(),
            pointer: PointerSettings::default(),
            active_area: ActiveArea::default(),
            scroll: ScrollSettings::default(),
            volume: VolumeSettings::default(),
            dictation: DictationSettings::default(),
        }
    }
}

impl Profile {
    pub fn from_toml_str(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    /// Every setting as `section.key` → value text.
    pub fn flatten(&self) -> Result<BTreeMap<String, String>> {
        let table = self.to_table()?;
        let mut out = BTreeMap::new();
        flatten_table("", &table, &mut out);
        Ok(out)
    }

    /// Applies `section.key = value` pairs, then re-validates.
    ///
    /// Values are read as TOML scalars (or arrays) and fall back to plain
    /// strings, so `pointer.curve=linear` and `pointer.curve="linear"` agree.
    pub fn apply_overrides<S: AsRef<str>>(&mut self, pairs: &[(S, S)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut table = self.to_table()?;
        for (key, raw) in pairs {
            let (key, raw) = (key.as_ref().trim(), raw.as_ref().trim());
            let (section, field) = key
                .split_once('.')
                .ok_or_else(|| anyhow!("setting '{key}' must look like section.key"))?;
            let slot = table
                .get_mut(section)
                .and_then(|v| v.as_table_mut())
                .and_then(|t| t.get_mut(field))
                .ok_or_else(|| anyhow!("unknown setting: {key}"))?;
            *slot = parse_value(raw);
        }
        let profile: Profile = toml::Value::Table(table)
            .try_into()
            .map_err(|e| anyhow!("invalid override: {e}"))?;
        validate_profile(&profile)?;
        *self = profile;
        Ok(())
    }

    fn to_table(&self) -> Result<toml::Table> {
        match toml::Value::try_from(self)? {
            toml::Value::Table(t) => Ok(t),
            other => Err(anyhow!("profile serialized as {}", other.type_str())),
        }
    }
}

/// Splits a `key=value` command line argument.
pub fn parse_override(arg: &str) -> Result<(String, String)> {
    let (k, v) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{arg}'"))?;
    if k.trim().is_empty() {
        return Err(anyhow!("empty setting key in '{arg}'"));
    }
    Ok((k.trim().to_string(), v.trim().to_string()))
}

fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

fn flatten_table(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => flatten_table(&key, sub, out),
            other => {
                out.insert(key, other.to_string());
            }
        }
    }
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    let (g, ptr, area) = (&p.gesture, &p.pointer, &p.active_area);
    // NaN slips through every ordered comparison below
    for (key, v) in [
        ("gesture.pinch_threshold", g.pinch_threshold as f64),
        ("gesture.global_pause_distance", g.global_pause_distance as f64),
        ("pointer.ema_min", ptr.ema_min),
        ("pointer.ema_max", ptr.ema_max),
        ("pointer.speed_min", ptr.speed_min),
        ("pointer.speed_max", ptr.speed_max),
        ("pointer.sigmoid_steepness", ptr.sigmoid_steepness),
        ("pointer.sigmoid_midpoint", ptr.sigmoid_midpoint),
        ("active_area.left", area.left),
        ("active_area.right", area.right),
        ("active_area.top", area.top),
        ("active_area.bottom", area.bottom),
        ("scroll.sensitivity", p.scroll.sensitivity as f64),
    ] {
        if !v.is_finite() {
            return Err(anyhow!("{key} must be a finite number, got {v}"));
        }
    }

    if !(10.0..=100.0).contains(&g.pinch_threshold) {
        return Err(anyhow!(
            "gesture.pinch_threshold must be in 10..=100, got {}",
            g.pinch_threshold
        ));
    }
    if !(1..=60).contains(&g.stable_frames) {
        return Err(anyhow!(
            "gesture.stable_frames must be in 1..=60, got {}",
            g.stable_frames
        ));
    }
    if g.global_pause_distance <= 0.0 {
        return Err(anyhow!("gesture.global_pause_distance must be positive"));
    }

    if !(ptr.ema_min > 0.0 && ptr.ema_min <= 1.0) {
        return Err(anyhow!("pointer.ema_min must be in (0,1], got {}", ptr.ema_min));
    }
    if !(ptr.ema_max >= ptr.ema_min && ptr.ema_max <= 1.0) {
        return Err(anyhow!(
            "pointer.ema_max must be in [ema_min,1], got {}",
            ptr.ema_max
        ));
    }
    if ptr.speed_min < 0.0 || ptr.speed_max <= ptr.speed_min {
        return Err(anyhow!(
            "pointer.speed_max must exceed pointer.speed_min (>= 0)"
        ));
    }
    if ptr.sigmoid_steepness <= 0.0 {
        return Err(anyhow!("pointer.sigmoid_steepness must be positive"));
    }

    if let Some((edge, v)) = p.active_area.out_of_range() {
        return Err(anyhow!("active_area.{edge} must be in 0.01..=0.49, got {v}"));
    }
    for (key, r) in [("camera", p.camera), ("screen", p.screen)] {
        if r.width == 0 || r.height == 0 {
            return Err(anyhow!("{key}.width and {key}.height must be positive"));
        }
    }

    if p.scroll.sensitivity <= 0.0 {
        return Err(anyhow!("scroll.sensitivity must be positive"));
    }
    if p.scroll.threshold < 0 {
        return Err(anyhow!("scroll.threshold must not be negative"));
    }
    if !(1..=10).contains(&p.volume.step) {
        return Err(anyhow!("volume.step must be in 1..=10, got {}", p.volume.step));
    }
    if p.volume.dead_band < 0 {
        return Err(anyhow!("volume.dead_band must not be negative"));
    }

    let d = &p.dictation;
    if d.enabled {
        if d.command.is_empty() {
            return Err(anyhow!("dictation.enabled requires dictation.command"));
        }
        if !p.meta.allow_commands {
            return Err(anyhow!(
                "dictation.command runs an external program but meta.allow_commands=false"
            ));
        }
        if d.timeout_secs == 0 {
            return Err(anyhow!("dictation.timeout_secs must be positive"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("handctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_from(config_dir()?)
    }

    /// Same as `load_or_install_default`, rooted at an explicit directory.
    pub fn load_from(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)
            .with_context(|| format!("creating {}", profdir.display()))?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile_file(&profdir.join(format!("{active_name}.toml")))?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    /// Re-reads the active profile; on failure the last good one is kept.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile_file(&self.profile_path(&self.active_name))?;
        Ok(())
    }

    pub fn load_named(&self, name: &str) -> Result<Profile> {
        load_profile_file(&self.profile_path(name))
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile_file(&p)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        let pactl_ok = command_available("pactl");
        let source = &self.profile.source.path;
        let source_ok = source == "-" || Path::new(source).exists();
        let dictation = &self.profile.dictation;
        let transcriber_ok = !dictation.enabled
            || dictation
                .command
                .first()
                .is_some_and(|prog| command_available(prog));
        if !uinput_ok {
            warn!("doctor: /dev/uinput missing");
        }
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "pactl_available": pactl_ok,
            "source": source,
            "source_present": source_ok,
            "dictation_enabled": dictation.enabled,
            "transcriber_available": transcriber_ok,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
                "volume": "volume and mute use pactl (pulseaudio-utils or pipewire-pulse)"
            }
        })
    }
}

pub fn load_profile_file(path: &Path) -> Result<Profile> {
    let txt = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::from_toml_str(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn command_available(prog: &str) -> bool {
    Command::new(prog)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}
