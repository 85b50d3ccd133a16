//! Camera → screen coordinate mapping through a central active rectangle.
//!
//! Each camera edge is inset by a fraction of the frame; the remaining rectangle
//! spans the full screen. With the default 35% insets only the middle 30% of
//! the frame is live, so small hand excursions cover the whole display.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

pub const MIN_INSET: f64 = 0.01;
pub const MAX_INSET: f64 = 0.49;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveArea {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for ActiveArea {
    fn default() -> Self {
        Self {
            left: 0.35,
            right: 0.35,
            top: 0.35,
            bottom: 0.35,
        }
    }
}

impl ActiveArea {
    /// Name and value of the first inset outside `MIN_INSET..=MAX_INSET`.
    pub fn out_of_range(&self) -> Option<(&'static str, f64)> {
        [
            ("left", self.left),
            ("right", self.right),
            ("top", self.top),
            ("bottom", self.bottom),
        ]
        .into_iter()
        .find(|(_, v)| !(MIN_INSET..=MAX_INSET).contains(v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapper {
    area: ActiveArea,
    camera: (u32, u32),
    screen: (u32, u32),
}

impl ScreenMapper {
    pub fn new(area: ActiveArea, camera: (u32, u32), screen: (u32, u32)) -> Self {
        Self {
            area,
            camera,
            screen,
        }
    }

    /// Active rectangle in camera pixels as (left, top, width, height).
    pub fn active_rect(&self) -> (f64, f64, f64, f64) {
        let (cw, ch) = (self.camera.0 as f64, self.camera.1 as f64);
        let left = cw * self.area.left;
        let top = ch * self.area.top;
        let right = cw * (1.0 - self.area.right);
        let bottom = ch * (1.0 - self.area.bottom);
        (left, top, right - left, bottom - top)
    }

    /// Linear map of a camera point onto the screen, clamped to the screen bounds.
    pub fn map(&self, p: Point) -> Point {
        let (left, top, w, h) = self.active_rect();
        let nx = (p.x as f64 - left) / w;
        let ny = (p.y as f64 - top) / h;
        let sx = (nx * self.screen.0 as f64) as i32;
        let sy = (ny * self.screen.1 as f64) as i32;
        Point::new(
            sx.clamp(0, self.screen.0 as i32 - 1),
            sy.clamp(0, self.screen.1 as i32 - 1),
        )
    }

    pub fn screen(&self) -> (u32, u32) {
        self.screen
    }
}
