//! Per-frame hand snapshots as delivered by the landmark estimator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Point;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_PIP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const PALM_BASE: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }

    /// Case-insensitive parse of the estimator's side label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Some(Hand::Left),
            "right" | "r" => Some(Hand::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered anatomical points for one hand. May hold fewer than
/// [`LANDMARK_COUNT`] points when the estimator delivered a partial hand;
/// classifiers treat such a hand as "no gesture".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandLandmarks {
    points: Vec<Point>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() >= LANDMARK_COUNT
    }

    pub fn get(&self, idx: usize) -> Option<Point> {
        self.points.get(idx).copied()
    }

    /// Point lookup for callers that already checked [`is_complete`](Self::is_complete).
    pub(crate) fn at(&self, idx: usize) -> Point {
        self.points[idx]
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

impl From<Vec<(i32, i32)>> for HandLandmarks {
    fn from(v: Vec<(i32, i32)>) -> Self {
        Self::new(v.into_iter().map(Point::from).collect())
    }
}

/// All hands seen in one camera frame, at most one per side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameHands {
    pub left: Option<HandLandmarks>,
    pub right: Option<HandLandmarks>,
}

impl FrameHands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `landmarks` for `hand` unless that side is already occupied.
    /// Returns false when the hand was ignored.
    pub fn insert(&mut self, hand: Hand, landmarks: HandLandmarks) -> bool {
        let slot = match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(landmarks);
        true
    }

    pub fn with(mut self, hand: Hand, landmarks: HandLandmarks) -> Self {
        self.insert(hand, landmarks);
        self
    }

    pub fn get(&self, hand: Hand) -> Option<&HandLandmarks> {
        match hand {
            Hand::Left => self.left.as_ref(),
            Hand::Right => self.right.as_ref(),
        }
    }

    pub fn count(&self) -> usize {
        self.left.is_some() as usize + self.right.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
