//! Speed-adaptive exponential smoothing for the pointer path.
//!
//! # Algorithm
//!
//! Each sample:
//!
//! 1. `speed` = distance between this raw screen position and the previous one
//!    (0 for the first sample).
//! 2. The response curve turns speed into a fraction `f` in [0, 1]:
//!    * linear: `f = norm(speed)`
//!    * exponential: `f = norm(speed)²`
//!    * sigmoid: `f = 1 / (1 + e^(-k·(speed - midpoint)))` on raw speed
//!
//!    where `norm` clamps `(speed - speed_min) / (speed_max - speed_min)` to [0, 1].
//! 3. `alpha = ema_min + (ema_max - ema_min) · f`, clamped to the same bounds.
//! 4. `smoothed = alpha · raw + (1 - alpha) · smoothed_prev` per axis. The first
//!    sample after construction or [`reset`](AdaptivePointerFilter::reset) seeds
//!    `smoothed = raw`.
//!
//! Slow motion gets a small alpha (jitter rejection), fast motion a large one
//! (low lag).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::PointerSettings;

/// Weight of the newest speed sample in the reported speed estimate.
const SPEED_EMA: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseCurve {
    Linear,
    Exponential,
    #[default]
    Sigmoid,
}

impl ResponseCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCurve::Linear => "linear",
            ResponseCurve::Exponential => "exponential",
            ResponseCurve::Sigmoid => "sigmoid",
        }
    }
}

impl fmt::Display for ResponseCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseCurve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(ResponseCurve::Linear),
            "exponential" => Ok(ResponseCurve::Exponential),
            "sigmoid" => Ok(ResponseCurve::Sigmoid),
            other => Err(format!("unknown response curve: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdaptivePointerFilter {
    cfg: PointerSettings,
    prev_raw: Option<(f64, f64)>,
    smoothed: Option<(f64, f64)>,
    alpha: f64,
    speed: f64,
}

impl AdaptivePointerFilter {
    pub fn new(cfg: PointerSettings) -> Self {
        let alpha = (cfg.ema_min + cfg.ema_max) / 2.0;
        Self {
            cfg,
            prev_raw: None,
            smoothed: None,
            alpha,
            speed: 0.0,
        }
    }

    /// Swaps the tuning without touching the running state.
    pub fn set_settings(&mut self, cfg: PointerSettings) {
        self.cfg = cfg;
        self.alpha = self.alpha.clamp(cfg.ema_min, cfg.ema_max);
    }

    pub fn settings(&self) -> &PointerSettings {
        &self.cfg
    }

    /// Coefficient used for the most recent sample.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Smoothed speed estimate in pixels per frame.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_seeded(&self) -> bool {
        self.smoothed.is_some()
    }

    /// Maps an instantaneous speed to a smoothing coefficient.
    pub fn alpha_for_speed(&self, speed: f64) -> f64 {
        let c = &self.cfg;
        let span = (c.speed_max - c.speed_min).max(f64::EPSILON);
        let norm = ((speed - c.speed_min) / span).clamp(0.0, 1.0);
        let fraction = match c.curve {
            ResponseCurve::Linear => norm,
            ResponseCurve::Exponential => norm * norm,
            ResponseCurve::Sigmoid => {
                1.0 / (1.0 + (-c.sigmoid_steepness * (speed - c.sigmoid_midpoint)).exp())
            }
        };
        (c.ema_min + (c.ema_max - c.ema_min) * fraction).clamp(c.ema_min, c.ema_max)
    }

    pub fn smooth(&mut self, raw_x: f64, raw_y: f64) -> (f64, f64) {
        let speed = match self.prev_raw {
            Some((px, py)) => ((raw_x - px).powi(2) + (raw_y - py).powi(2)).sqrt(),
            None => 0.0,
        };
        self.prev_raw = Some((raw_x, raw_y));
        self.alpha = self.alpha_for_speed(speed);
        self.speed = SPEED_EMA * speed + (1.0 - SPEED_EMA) * self.speed;

        let out = match self.smoothed {
            None => (raw_x, raw_y),
            Some((sx, sy)) => {
                let a = self.alpha;
                (a * raw_x + (1.0 - a) * sx, a * raw_y + (1.0 - a) * sy)
            }
        };
        self.smoothed = Some(out);
        out
    }

    /// Forget all history; the next sample seeds the filter.
    pub fn reset(&mut self) {
        self.prev_raw = None;
        self.smoothed = None;
        self.speed = 0.0;
        self.alpha = (self.cfg.ema_min + self.cfg.ema_max) / 2.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(curve: ResponseCurve) -> PointerSettings {
        PointerSettings {
            curve,
            ..PointerSettings::default()
        }
    }

    #[test]
    fn first_sample_seeds() {
        let mut f = AdaptivePointerFilter::new(settings(ResponseCurve::Linear));
        assert_eq!(f.smooth(500.0, 300.0), (500.0, 300.0));
        assert!(f.is_seeded());
    }

    #[test]
    fn sigmoid_jump_then_rest() {
        let cfg = settings(ResponseCurve::Sigmoid);
        let mut f = AdaptivePointerFilter::new(cfg);
        f.smooth(100.0, 100.0);
        f.smooth(100.0, 400.0);
        assert!((f.alpha() - cfg.ema_max).abs() < 1e-3, "alpha={}", f.alpha());

        f.smooth(100.0, 400.0);
        let rest = f.alpha();
        assert!(rest < cfg.ema_min + 0.05 * (cfg.ema_max - cfg.ema_min), "alpha={rest}");
    }

    #[test]
    fn linear_below_speed_min_is_ema_min() {
        let cfg = settings(ResponseCurve::Linear);
        let f = AdaptivePointerFilter::new(cfg);
        assert_eq!(f.alpha_for_speed(0.0), cfg.ema_min);
        assert!((f.alpha_for_speed(cfg.speed_max * 2.0) - cfg.ema_max).abs() < 1e-9);
    }

    #[test]
    fn exponential_is_gentler_than_linear() {
        let lin = AdaptivePointerFilter::new(settings(ResponseCurve::Linear));
        let exp = AdaptivePointerFilter::new(settings(ResponseCurve::Exponential));
        let mid = (lin.settings().speed_min + lin.settings().speed_max) / 2.0;
        assert!(exp.alpha_for_speed(mid) < lin.alpha_for_speed(mid));
    }

    #[test]
    fn constant_input_converges() {
        let mut f = AdaptivePointerFilter::new(settings(ResponseCurve::Linear));
        f.smooth(0.0, 0.0);
        let mut last = (0.0, 0.0);
        for _ in 0..2000 {
            last = f.smooth(50.0, 80.0);
        }
        assert!((last.0 - 50.0).abs() < 0.5 && (last.1 - 80.0).abs() < 0.5, "{last:?}");
        assert_eq!(f.alpha(), f.settings().ema_min);
        assert!(f.speed() < 1e-6);
    }

    #[test]
    fn reset_reseeds() {
        let mut f = AdaptivePointerFilter::new(settings(ResponseCurve::Sigmoid));
        f.smooth(0.0, 0.0);
        f.smooth(10.0, 10.0);
        f.reset();
        assert!(!f.is_seeded());
        assert_eq!(f.smooth(900.0, 900.0), (900.0, 900.0));
        assert_eq!(f.speed(), 0.0);
    }

    #[test]
    fn curve_names_parse() {
        assert_eq!("Sigmoid".parse::<ResponseCurve>(), Ok(ResponseCurve::Sigmoid));
        assert_eq!("linear".parse::<ResponseCurve>(), Ok(ResponseCurve::Linear));
        assert!("cubic".parse::<ResponseCurve>().is_err());
    }
}
