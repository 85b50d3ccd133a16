//! Left-hand volume drag.
//!
//! The first volume-pose frame pins a reference height. While the pose holds,
//! every frame further than `dead_band` pixels from the reference repeats a
//! volume step at most once per cooldown. The reference stays put, so holding
//! the hand above it keeps raising the volume.

use std::time::{Duration, Instant};

use crate::config::VolumeSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDirection {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct VolumeDrag {
    cfg: VolumeSettings,
    reference: Option<i32>,
    last_step: Option<Instant>,
}

impl VolumeDrag {
    pub fn new(cfg: VolumeSettings) -> Self {
        Self {
            cfg,
            reference: None,
            last_step: None,
        }
    }

    pub fn set_settings(&mut self, cfg: VolumeSettings) {
        self.cfg = cfg;
    }

    pub fn is_active(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<i32> {
        self.reference
    }

    pub fn step(&self) -> u8 {
        self.cfg.step
    }

    pub fn update(&mut self, y: i32, now: Instant) -> Option<VolumeDirection> {
        let Some(reference) = self.reference else {
            self.reference = Some(y);
            return None;
        };

        if let Some(last) = self.last_step {
            if now.saturating_duration_since(last) < Duration::from_millis(self.cfg.cooldown_ms) {
                return None;
            }
        }

        let dy = reference - y;
        let dir = if dy > self.cfg.dead_band {
            VolumeDirection::Up
        } else if dy < -self.cfg.dead_band {
            VolumeDirection::Down
        } else {
            return None;
        };
        self.last_step = Some(now);
        Some(dir)
    }

    /// Pose broken: forget the reference.
    pub fn reset(&mut self) {
        self.reference = None;
    }
}
