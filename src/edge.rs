//! Rising-edge detection for toggle gestures held across many frames.

/// Fires once per continuous interval during which the watched condition holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeTrigger {
    high: bool,
}

impl EdgeTrigger {
    pub const fn new() -> Self {
        Self { high: false }
    }

    /// Feed this frame's condition; true only on a false → true transition.
    pub fn update(&mut self, condition: bool) -> bool {
        let rising = condition && !self.high;
        self.high = condition;
        rising
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Marks the condition as already held, so the next `update(true)` does not fire.
    pub fn latch(&mut self) {
        self.high = true;
    }

    pub fn reset(&mut self) {
        self.high = false;
    }
}
