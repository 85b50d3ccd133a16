use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
        }
    }

    pub fn other(self) -> Self {
        match self {
            MouseButton::Left => MouseButton::Right,
            MouseButton::Right => MouseButton::Left,
        }
    }
}

impl std::str::FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            other => Err(format!("unknown mouse button: {other}")),
        }
    }
}

/// One decision of the session, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    MoveTo { x: i32, y: i32 },
    Press(MouseButton),
    Release(MouseButton),
    DoubleClick,
    Scroll(i32),
    VolumeUp(u8),
    VolumeDown(u8),
    MuteToggle,
    MediaPlayPause,
    /// Routed to the dictation worker rather than a sink.
    RequestDictation,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::MoveTo { .. } => "move_to",
            Action::Press(_) => "press",
            Action::Release(_) => "release",
            Action::DoubleClick => "double_click",
            Action::Scroll(_) => "scroll",
            Action::VolumeUp(_) => "volume_up",
            Action::VolumeDown(_) => "volume_down",
            Action::MuteToggle => "mute_toggle",
            Action::MediaPlayPause => "media_play_pause",
            Action::RequestDictation => "request_dictation",
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("virtual input device: {0}")]
    Device(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("`{cmd}` failed: {detail}")]
    Command { cmd: String, detail: String },
    #[error("{0} is unavailable")]
    Unavailable(&'static str),
}

fn device_err(e: impl std::fmt::Display) -> ActionError {
    ActionError::Device(e.to_string())
}

/// Capability surface for input injection. Calls are fire-and-forget; the
/// caller logs failures and never retries.
pub trait ActionSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ActionError>;
    fn press(&mut self, button: MouseButton) -> Result<(), ActionError>;
    fn release(&mut self, button: MouseButton) -> Result<(), ActionError>;
    fn double_click(&mut self) -> Result<(), ActionError>;
    fn scroll(&mut self, amount: i32) -> Result<(), ActionError>;
    fn volume_up(&mut self, step: u8) -> Result<(), ActionError>;
    fn volume_down(&mut self, step: u8) -> Result<(), ActionError>;
    fn mute_toggle(&mut self) -> Result<(), ActionError>;
    fn media_play_pause(&mut self) -> Result<(), ActionError>;
    /// Types `text`; a `'\n'` presses Enter.
    fn type_text(&mut self, text: &str) -> Result<(), ActionError>;

    /// Performs a session action. `RequestDictation` is not a sink concern
    /// and is accepted without effect.
    fn apply(&mut self, action: &Action) -> Result<(), ActionError> {
        match *action {
            Action::MoveTo { x, y } => self.move_to(x, y),
            Action::Press(b) => self.press(b),
            Action::Release(b) => self.release(b),
            Action::DoubleClick => self.double_click(),
            Action::Scroll(n) => self.scroll(n),
            Action::VolumeUp(step) => self.volume_up(step),
            Action::VolumeDown(step) => self.volume_down(step),
            Action::MuteToggle => self.mute_toggle(),
            Action::MediaPlayPause => self.media_play_pause(),
            Action::RequestDictation => Ok(()),
        }
    }
}

impl<S: ActionSink + ?Sized> ActionSink for Box<S> {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ActionError> {
        (**self).move_to(x, y)
    }
    fn press(&mut self, button: MouseButton) -> Result<(), ActionError> {
        (**self).press(button)
    }
    fn release(&mut self, button: MouseButton) -> Result<(), ActionError> {
        (**self).release(button)
    }
    fn double_click(&mut self) -> Result<(), ActionError> {
        (**self).double_click()
    }
    fn scroll(&mut self, amount: i32) -> Result<(), ActionError> {
        (**self).scroll(amount)
    }
    fn volume_up(&mut self, step: u8) -> Result<(), ActionError> {
        (**self).volume_up(step)
    }
    fn volume_down(&mut self, step: u8) -> Result<(), ActionError> {
        (**self).volume_down(step)
    }
    fn mute_toggle(&mut self) -> Result<(), ActionError> {
        (**self).mute_toggle()
    }
    fn media_play_pause(&mut self) -> Result<(), ActionError> {
        (**self).media_play_pause()
    }
    fn type_text(&mut self, text: &str) -> Result<(), ActionError> {
        (**self).type_text(text)
    }
}

// ---------------- native sink ----------------

pub struct UinputSink {
    screen: (u32, u32),
    /// Last commanded absolute position; `None` until the pointer is homed.
    cursor: Option<(i32, i32)>,
    #[cfg(target_os = "linux")]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new(screen: (u32, u32)) -> Result<Self, ActionError> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                screen,
                cursor: None,
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop(screen))
        }
    }

    pub fn noop(screen: (u32, u32)) -> Self {
        Self {
            screen,
            cursor: None,
            #[cfg(target_os = "linux")]
            linux: None,
        }
    }

    /// False in no-op mode.
    pub fn has_device(&self) -> bool {
        #[cfg(target_os = "linux")]
        {
            self.linux.is_some()
        }
        #[cfg(not(target_os = "linux"))]
        {
            false
        }
    }

    fn clamp_to_screen(&self, x: i32, y: i32) -> (i32, i32) {
        let max_x = self.screen.0.saturating_sub(1) as i32;
        let max_y = self.screen.1.saturating_sub(1) as i32;
        (x.clamp(0, max_x), y.clamp(0, max_y))
    }
}

fn pactl(args: &[&str]) -> Result<(), ActionError> {
    let cmd = format!("pactl {}", args.join(" "));
    let status = Command::new("pactl")
        .args(args)
        .status()
        .map_err(|e| ActionError::Command {
            cmd: cmd.clone(),
            detail: e.to_string(),
        })?;
    if !status.success() {
        return Err(ActionError::Command {
            cmd,
            detail: status.to_string(),
        });
    }
    Ok(())
}

impl ActionSink for UinputSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ActionError> {
        let (x, y) = self.clamp_to_screen(x, y);
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            let (cx, cy) = match self.cursor {
                Some(c) => c,
                None => {
                    // slam into the top-left corner so relative deltas have an origin
                    let (w, h) = (self.screen.0 as i32, self.screen.1 as i32);
                    dev.move_rel(-2 * w, -2 * h)?;
                    debug!("uinput: pointer homed");
                    (0, 0)
                }
            };
            let (dx, dy) = (x - cx, y - cy);
            if dx != 0 || dy != 0 {
                dev.move_rel(dx, dy)?;
            }
        }
        self.cursor = Some((x, y));
        Ok(())
    }

    fn press(&mut self, button: MouseButton) -> Result<(), ActionError> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.button(button, 1)?;
        }
        Ok(())
    }

    fn release(&mut self, button: MouseButton) -> Result<(), ActionError> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.button(button, 0)?;
        }
        Ok(())
    }

    fn double_click(&mut self) -> Result<(), ActionError> {
        for _ in 0..2 {
            self.press(MouseButton::Left)?;
            self.release(MouseButton::Left)?;
        }
        Ok(())
    }

    fn scroll(&mut self, amount: i32) -> Result<(), ActionError> {
        if amount == 0 {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.scroll_vertical(amount)?;
        }
        Ok(())
    }

    fn volume_up(&mut self, step: u8) -> Result<(), ActionError> {
        if !self.has_device() {
            return Ok(());
        }
        pactl(&["set-sink-volume", "@DEFAULT_SINK@", &format!("+{step}%")])
    }

    fn volume_down(&mut self, step: u8) -> Result<(), ActionError> {
        if !self.has_device() {
            return Ok(());
        }
        pactl(&["set-sink-volume", "@DEFAULT_SINK@", &format!("-{step}%")])
    }

    fn mute_toggle(&mut self) -> Result<(), ActionError> {
        if !self.has_device() {
            return Ok(());
        }
        pactl(&["set-sink-mute", "@DEFAULT_SINK@", "toggle"])
    }

    fn media_play_pause(&mut self) -> Result<(), ActionError> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.tap(&uinput::event::keyboard::Misc::PlayPause)?;
        }
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<(), ActionError> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            for ch in text.chars() {
                match map_char(ch) {
                    Some((key, shift)) => dev.type_key(key, shift)?,
                    None => debug!("uinput: no key for {ch:?}, skipped"),
                }
            }
        }
        Ok(())
    }
}

/// Key and shift state for a character on a US layout.
#[cfg(target_os = "linux")]
fn map_char(ch: char) -> Option<(uinput::event::keyboard::Key, bool)> {
    use uinput::event::keyboard::Key as K;
    const LETTERS: [K; 26] = [
        K::A, K::B, K::C, K::D, K::E, K::F, K::G, K::H, K::I, K::J, K::K, K::L, K::M, K::N,
        K::O, K::P, K::Q, K::R, K::S, K::T, K::U, K::V, K::W, K::X, K::Y, K::Z,
    ];
    const DIGITS: [K; 10] = [
        K::_0, K::_1, K::_2, K::_3, K::_4, K::_5, K::_6, K::_7, K::_8, K::_9,
    ];
    let k = match ch {
        'a'..='z' => (LETTERS[(ch as u8 - b'a') as usize], false),
        'A'..='Z' => (LETTERS[(ch as u8 - b'A') as usize], true),
        '0'..='9' => (DIGITS[(ch as u8 - b'0') as usize], false),
        ' ' => (K::Space, false),
        '\n' => (K::Enter, false),
        '\t' => (K::Tab, false),
        '.' => (K::Dot, false),
        ',' => (K::Comma, false),
        '-' => (K::Minus, false),
        '=' => (K::Equal, false),
        '/' => (K::Slash, false),
        ';' => (K::SemiColon, false),
        '\'' => (K::Apostrophe, false),
        '?' => (K::Slash, true),
        '!' => (K::_1, true),
        ':' => (K::SemiColon, true),
        '"' => (K::Apostrophe, true),
        '_' => (K::Minus, true),
        '+' => (K::Equal, true),
        _ => return None,
    };
    Some(k)
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self, ActionError> {
        use uinput::event::{Keyboard, controller::Mouse, relative};

        let dev = uinput::default()
            .map_err(device_err)?
            .name("Handctl Virtual Input")
            .map_err(device_err)?
            // relative axes + wheel
            .event(relative::Position::X)
            .map_err(device_err)?
            .event(relative::Position::Y)
            .map_err(device_err)?
            .event(relative::Wheel::Vertical)
            .map_err(device_err)?
            // mouse buttons
            .event(Mouse::Left)
            .map_err(device_err)?
            .event(Mouse::Right)
            .map_err(device_err)?
            // text and media keys
            .event(Keyboard::All)
            .map_err(device_err)?
            .create()
            .map_err(device_err)?;

        info!("uinput: created virtual device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<(), ActionError> {
        self.dev.synchronize().map_err(device_err)
    }

    fn move_rel(&mut self, dx: i32, dy: i32) -> Result<(), ActionError> {
        use uinput::event::relative::Position;
        self.dev.send(Position::X, dx).map_err(device_err)?;
        self.dev.send(Position::Y, dy).map_err(device_err)?;
        self.sync()
    }

    fn button(&mut self, button: MouseButton, val: i32) -> Result<(), ActionError> {
        use uinput::event::controller::Mouse;
        let code = match button {
            MouseButton::Left => Mouse::Left,
            MouseButton::Right => Mouse::Right,
        };
        self.dev.send(code, val).map_err(device_err)?;
        self.sync()
    }

    fn scroll_vertical(&mut self, steps: i32) -> Result<(), ActionError> {
        use uinput::event::relative::Wheel;
        self.dev.send(Wheel::Vertical, steps).map_err(device_err)?;
        self.sync()
    }

    fn tap(&mut self, key: &uinput::event::keyboard::Misc) -> Result<(), ActionError> {
        self.dev.click(key).map_err(device_err)?;
        self.sync()
    }

    fn type_key(&mut self, key: uinput::event::keyboard::Key, shift: bool) -> Result<(), ActionError> {
        use uinput::event::keyboard::Key;
        if shift {
            self.dev.send(Key::LeftShift, 1).map_err(device_err)?;
        }
        self.dev.send(key, 1).map_err(device_err)?;
        self.sync()?;
        self.dev.send(key, 0).map_err(device_err)?;
        if shift {
            self.dev.send(Key::LeftShift, 0).map_err(device_err)?;
        }
        self.sync()
    }
}

// ---------------- test / dry-run sinks ----------------

#[derive(Debug, Default)]
struct Recorded {
    actions: Vec<Action>,
    typed: Vec<String>,
}

/// Records every call. Clones share one log, so a clone handed to another
/// thread stays observable.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Recorded>>,
    fail: Vec<&'static str>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects the named calls (`"press"`, `"volume_up"`, ...)
    /// after recording them.
    pub fn failing(ops: &[&'static str]) -> Self {
        Self {
            log: Arc::default(),
            fail: ops.to_vec(),
        }
    }

    pub fn actions(&self) -> Vec<Action> {
        self.log.lock().map(|l| l.actions.clone()).unwrap_or_default()
    }

    pub fn typed(&self) -> Vec<String> {
        self.log.lock().map(|l| l.typed.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<Action> {
        self.log
            .lock()
            .map(|mut l| std::mem::take(&mut l.actions))
            .unwrap_or_default()
    }

    fn record(&mut self, action: Action) -> Result<(), ActionError> {
        if let Ok(mut l) = self.log.lock() {
            l.actions.push(action);
        }
        self.check(action.name())
    }

    fn check(&self, op: &'static str) -> Result<(), ActionError> {
        if self.fail.contains(&op) {
            return Err(ActionError::Unavailable(op));
        }
        Ok(())
    }
}

impl ActionSink for RecordingSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ActionError> {
        self.record(Action::MoveTo { x, y })
    }
    fn press(&mut self, button: MouseButton) -> Result<(), ActionError> {
        self.record(Action::Press(button))
    }
    fn release(&mut self, button: MouseButton) -> Result<(), ActionError> {
        self.record(Action::Release(button))
    }
    fn double_click(&mut self) -> Result<(), ActionError> {
        self.record(Action::DoubleClick)
    }
    fn scroll(&mut self, amount: i32) -> Result<(), ActionError> {
        self.record(Action::Scroll(amount))
    }
    fn volume_up(&mut self, step: u8) -> Result<(), ActionError> {
        self.record(Action::VolumeUp(step))
    }
    fn volume_down(&mut self, step: u8) -> Result<(), ActionError> {
        self.record(Action::VolumeDown(step))
    }
    fn mute_toggle(&mut self) -> Result<(), ActionError> {
        self.record(Action::MuteToggle)
    }
    fn media_play_pause(&mut self) -> Result<(), ActionError> {
        self.record(Action::MediaPlayPause)
    }
    fn type_text(&mut self, text: &str) -> Result<(), ActionError> {
        if let Ok(mut l) = self.log.lock() {
            l.typed.push(text.to_string());
        }
        self.check("type_text")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ActionSink for NoopSink {
    fn move_to(&mut self, _x: i32, _y: i32) -> Result<(), ActionError> {
        Ok(())
    }
    fn press(&mut self, _button: MouseButton) -> Result<(), ActionError> {
        Ok(())
    }
    fn release(&mut self, _button: MouseButton) -> Result<(), ActionError> {
        Ok(())
    }
    fn double_click(&mut self) -> Result<(), ActionError> {
        Ok(())
    }
    fn scroll(&mut self, _amount: i32) -> Result<(), ActionError> {
        Ok(())
    }
    fn volume_up(&mut self, _step: u8) -> Result<(), ActionError> {
        Ok(())
    }
    fn volume_down(&mut self, _step: u8) -> Result<(), ActionError> {
        Ok(())
    }
    fn mute_toggle(&mut self) -> Result<(), ActionError> {
        Ok(())
    }
    fn media_play_pause(&mut self) -> Result<(), ActionError> {
        Ok(())
    }
    fn type_text(&mut self, _text: &str) -> Result<(), ActionError> {
        Ok(())
    }
}
