#![allow(dead_code)]

use handctl::geometry::Point;
use handctl::landmarks::*;

/// Synthetic hand in camera pixels. Starts as a fist: every fingertip below
/// its PIP, thumb tucked, tips spread far apart.
#[derive(Clone)]
pub struct Pose {
    pts: Vec<Point>,
}

impl Pose {
    pub fn fist() -> Self {
        let mut pts = vec![Point::new(0, 0); LANDMARK_COUNT];
        pts[WRIST] = Point::new(300, 400);
        pts[PALM_BASE] = Point::new(300, 300);
        pts[THUMB_PIP] = Point::new(200, 300);
        pts[THUMB_TIP] = Point::new(210, 320);
        for (i, (pip, tip)) in [
            (INDEX_PIP, INDEX_TIP),
            (MIDDLE_PIP, MIDDLE_TIP),
            (RING_PIP, RING_TIP),
            (PINKY_PIP, PINKY_TIP),
        ]
        .into_iter()
        .enumerate()
        {
            let x = 400 + 100 * i as i32;
            pts[pip] = Point::new(x, 200);
            pts[tip] = Point::new(x, 230);
        }
        Self { pts }
    }

    /// Thumb extended sideways, nothing pinched.
    pub fn open() -> Self {
        Self::fist().set(THUMB_TIP, 140, 300)
    }

    pub fn left_pinch() -> Self {
        Self::fist().set(THUMB_TIP, 410, 230)
    }

    pub fn right_pinch() -> Self {
        Self::fist().set(THUMB_TIP, 510, 230)
    }

    pub fn three_pinch() -> Self {
        Self::fist().set(THUMB_TIP, 410, 230).set(MIDDLE_TIP, 420, 230)
    }

    /// Index and middle raised with their tips at height `y`.
    pub fn v_sign(y: i32) -> Self {
        Self::fist()
            .set(INDEX_PIP, 400, 320)
            .set(MIDDLE_PIP, 500, 320)
            .set(INDEX_TIP, 400, y)
            .set(MIDDLE_TIP, 500, y)
    }

    /// Thumb tip next to the pinky tip.
    pub fn thumb_pinky() -> Self {
        Self::fist().set(THUMB_TIP, 705, 230)
    }

    pub fn set(mut self, idx: usize, x: i32, y: i32) -> Self {
        self.pts[idx] = Point::new(x, y);
        self
    }

    /// Moves the whole hand.
    pub fn shifted(mut self, dx: i32, dy: i32) -> Self {
        for p in &mut self.pts {
            *p = Point::new(p.x + dx, p.y + dy);
        }
        self
    }

    pub fn build(&self) -> HandLandmarks {
        HandLandmarks::new(self.pts.clone())
    }

    pub fn json(&self, label: &str) -> String {
        let pts: Vec<String> = self.pts.iter().map(|p| format!("[{},{}]", p.x, p.y)).collect();
        format!(r#"{{"label":"{label}","points":[{}]}}"#, pts.join(","))
    }
}

/// One wire line holding the given hands.
pub fn frame(hands: &[(&str, &Pose)]) -> String {
    let hands: Vec<String> = hands.iter().map(|(label, p)| p.json(label)).collect();
    format!(r#"{{"hands":[{}]}}"#, hands.join(","))
}

pub fn empty_frame() -> String {
    r#"{"hands":[]}"#.to_string()
}
