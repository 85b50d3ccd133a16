//! Two-finger vertical scrolling.
//!
//! The first frame in scroll mode captures a reference height. Later frames
//! scroll by `(reference - y) / sensitivity` notches once the hand has moved at
//! least `threshold` pixels and the cooldown has elapsed; the reference then
//! follows the hand. Raising the hand scrolls up (positive amount).

use std::time::{Duration, Instant};

use crate::config::ScrollSettings;

#[derive(Debug, Clone)]
pub struct ScrollTracker {
    cfg: ScrollSettings,
    reference: Option<i32>,
    last_emit: Option<Instant>,
}

impl ScrollTracker {
    pub fn new(cfg: ScrollSettings) -> Self {
        Self {
            cfg,
            reference: None,
            last_emit: None,
        }
    }

    pub fn set_settings(&mut self, cfg: ScrollSettings) {
        self.cfg = cfg;
    }

    /// True once a reference height has been captured.
    pub fn is_active(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<i32> {
        self.reference
    }

    /// Feed the tracked screen Y for a scroll-mode frame.
    pub fn update(&mut self, y: i32, now: Instant) -> Option<i32> {
        let Some(reference) = self.reference else {
            self.reference = Some(y);
            return None;
        };

        let diff = reference - y;
        if diff.abs() < self.cfg.threshold {
            return None;
        }
        let cooldown = Duration::from_millis(self.cfg.cooldown_ms);
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < cooldown {
                return None;
            }
        }

        let amount = (diff as f32 / self.cfg.sensitivity).trunc() as i32;
        if amount == 0 {
            return None;
        }
        self.reference = Some(y);
        self.last_emit = Some(now);
        Some(amount)
    }

    /// Leave scroll mode; the next frame captures a fresh reference.
    pub fn reset(&mut self) {
        self.reference = None;
    }
}
