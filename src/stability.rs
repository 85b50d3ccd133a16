//! Sliding-window confirmation of per-frame gesture labels.
//!
//! A label is confirmed only after it fills the whole window, and a confirmed
//! label never re-fires until a different label has been confirmed in between.
//! One misclassified frame therefore cannot flip the mode, at the cost of
//! roughly `window` frames of latency.

use std::collections::VecDeque;

use crate::gestures::Gesture;
use crate::landmarks::Hand;

#[derive(Debug, Clone)]
pub struct StabilityFilter {
    history: VecDeque<Gesture>,
    window: usize,
    confirmed: Gesture,
}

impl StabilityFilter {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            history: VecDeque::with_capacity(window),
            window,
            confirmed: Gesture::None,
        }
    }

    /// Feed one frame's label; returns the label when a new transition is confirmed.
    pub fn observe(&mut self, label: Gesture) -> Option<Gesture> {
        self.history.push_back(label);
        if self.history.len() > self.window {
            self.history.pop_front();
        }
        if self.history.len() < self.window {
            return None;
        }
        if self.history.iter().all(|g| *g == label) && label != self.confirmed {
            self.confirmed = label;
            return Some(label);
        }
        None
    }

    /// Last confirmed label (`None` until something is confirmed).
    pub fn confirmed(&self) -> Gesture {
        self.confirmed
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.confirmed = Gesture::None;
    }

    /// Changes the window length and starts over.
    pub fn resize(&mut self, window: usize) {
        *self = Self::new(window);
    }
}

/// One stability filter per tracked hand.
#[derive(Debug, Clone)]
pub struct HandStability {
    left: StabilityFilter,
    right: StabilityFilter,
}

impl HandStability {
    pub fn new(window: usize) -> Self {
        Self {
            left: StabilityFilter::new(window),
            right: StabilityFilter::new(window),
        }
    }

    pub fn get(&self, hand: Hand) -> &StabilityFilter {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, hand: Hand) -> &mut StabilityFilter {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    pub fn observe(&mut self, hand: Hand, label: Gesture) -> Option<Gesture> {
        self.get_mut(hand).observe(label)
    }

    pub fn resize(&mut self, window: usize) {
        self.left.resize(window);
        self.right.resize(window);
    }
}
