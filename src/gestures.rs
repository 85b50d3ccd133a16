//! Landmark → gesture classification.
//!
//! Everything here is a pure function of one hand's landmarks (or both hands'
//! for the global pause check). No history is kept; debouncing lives in
//! [`crate::stability`] and edge detection in [`crate::edge`].

use serde::Serialize;
use std::fmt;

use crate::config::GestureSettings;
use crate::geometry::{Point, distance};
use crate::landmarks::{
    HandLandmarks, INDEX_PIP, INDEX_TIP, MIDDLE_PIP, MIDDLE_TIP, PINKY_PIP, PINKY_TIP, RING_PIP,
    RING_TIP, THUMB_PIP, THUMB_TIP,
};

/// A finger tip must sit this many pixels above its PIP joint to count as up.
const FINGER_UP_MARGIN: i32 = 10;
/// Thumb extension is lateral: tip and PIP must be this far apart on x.
const THUMB_SPREAD: i32 = 30;
/// Pinching tips must also be at a similar height.
const PINCH_MAX_DY: i32 = 50;
/// Thumb-to-pinky reach is longer than a normal pinch.
const DICTATION_EXTRA: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    None,
    Move,
    Fist,
    Scroll,
    LeftClick,
    RightClick,
    DoubleClick,
    Mute3Finger,
    MediaPinch,
    DictationPinch,
}

impl Gesture {
    pub const ALL: [Gesture; 10] = [
        Gesture::None,
        Gesture::Move,
        Gesture::Fist,
        Gesture::Scroll,
        Gesture::LeftClick,
        Gesture::RightClick,
        Gesture::DoubleClick,
        Gesture::Mute3Finger,
        Gesture::MediaPinch,
        Gesture::DictationPinch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::None => "none",
            Gesture::Move => "move",
            Gesture::Fist => "fist",
            Gesture::Scroll => "scroll",
            Gesture::LeftClick => "left_click",
            Gesture::RightClick => "right_click",
            Gesture::DoubleClick => "double_click",
            Gesture::Mute3Finger => "mute_3finger",
            Gesture::MediaPinch => "media_pinch",
            Gesture::DictationPinch => "dictation_pinch",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    fn tip(self) -> usize {
        match self {
            Finger::Thumb => THUMB_TIP,
            Finger::Index => INDEX_TIP,
            Finger::Middle => MIDDLE_TIP,
            Finger::Ring => RING_TIP,
            Finger::Pinky => PINKY_TIP,
        }
    }

    fn pip(self) -> usize {
        match self {
            Finger::Thumb => THUMB_PIP,
            Finger::Index => INDEX_PIP,
            Finger::Middle => MIDDLE_PIP,
            Finger::Ring => RING_PIP,
            Finger::Pinky => PINKY_PIP,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GestureClassifier {
    pinch_threshold: f32,
    global_pause_distance: f32,
    dictation: bool,
}

impl GestureClassifier {
    pub fn new(settings: &GestureSettings, dictation: bool) -> Self {
        Self {
            pinch_threshold: settings.pinch_threshold,
            global_pause_distance: settings.global_pause_distance,
            dictation,
        }
    }

    pub fn pinch_threshold(&self) -> f32 {
        self.pinch_threshold
    }

    pub fn is_finger_up(&self, lm: &HandLandmarks, finger: Finger) -> bool {
        if !lm.is_complete() {
            return false;
        }
        let tip = lm.at(finger.tip());
        let pip = lm.at(finger.pip());
        match finger {
            Finger::Thumb => (tip.x - pip.x).abs() > THUMB_SPREAD,
            _ => tip.y < pip.y - FINGER_UP_MARGIN,
        }
    }

    /// Extended fingers in thumb → pinky order.
    pub fn fingers_up(&self, lm: &HandLandmarks) -> Vec<Finger> {
        Finger::ALL
            .into_iter()
            .filter(|f| self.is_finger_up(lm, *f))
            .collect()
    }

    /// Distance below threshold and tips at a similar height.
    pub fn is_pinch(&self, a: Point, b: Point) -> bool {
        distance(a, b) < self.pinch_threshold && (a.y - b.y).abs() < PINCH_MAX_DY
    }

    fn tips_pinch(&self, lm: &HandLandmarks, a: usize, b: usize) -> bool {
        lm.is_complete() && self.is_pinch(lm.at(a), lm.at(b))
    }

    pub fn is_fist(&self, lm: &HandLandmarks) -> bool {
        lm.is_complete() && self.fingers_up(lm).is_empty()
    }

    /// Index and middle up, ring and pinky down; the thumb is ignored.
    pub fn is_scroll(&self, lm: &HandLandmarks) -> bool {
        lm.is_complete()
            && self.is_finger_up(lm, Finger::Index)
            && self.is_finger_up(lm, Finger::Middle)
            && !self.is_finger_up(lm, Finger::Ring)
            && !self.is_finger_up(lm, Finger::Pinky)
    }

    pub fn is_left_pinch(&self, lm: &HandLandmarks) -> bool {
        self.tips_pinch(lm, THUMB_TIP, INDEX_TIP)
    }

    pub fn is_right_pinch(&self, lm: &HandLandmarks) -> bool {
        self.tips_pinch(lm, THUMB_TIP, MIDDLE_TIP)
    }

    /// Thumb, index and middle tips converged.
    pub fn is_three_finger_pinch(&self, lm: &HandLandmarks) -> bool {
        self.is_left_pinch(lm) && self.is_right_pinch(lm)
    }

    /// Thumb and pinky tips close; no height guard since their rest heights differ.
    pub fn is_dictation_pinch(&self, lm: &HandLandmarks) -> bool {
        lm.is_complete()
            && distance(lm.at(THUMB_TIP), lm.at(PINKY_TIP)) < self.pinch_threshold + DICTATION_EXTRA
    }

    /// Both index tips touching. Uses a wider threshold than a one-hand pinch.
    pub fn is_global_pause(&self, left: Option<&HandLandmarks>, right: Option<&HandLandmarks>) -> bool {
        match (left, right) {
            (Some(l), Some(r)) if l.is_complete() && r.is_complete() => {
                distance(l.at(INDEX_TIP), r.at(INDEX_TIP)) < self.global_pause_distance
            }
            _ => false,
        }
    }

    /// Primary (pointer) hand label.
    ///
    /// Priority: Fist > Scroll > DoubleClick > LeftClick > RightClick > Move.
    pub fn classify(&self, lm: &HandLandmarks) -> Gesture {
        if !lm.is_complete() {
            return Gesture::None;
        }
        if self.is_fist(lm) {
            return Gesture::Fist;
        }
        if self.is_scroll(lm) {
            return Gesture::Scroll;
        }
        if self.is_three_finger_pinch(lm) {
            return Gesture::DoubleClick;
        }
        if self.is_left_pinch(lm) {
            return Gesture::LeftClick;
        }
        if self.is_right_pinch(lm) {
            return Gesture::RightClick;
        }
        Gesture::Move
    }

    /// Secondary (media) hand label.
    ///
    /// Priority: Fist > DictationPinch > Mute3Finger > MediaPinch > Scroll > Move.
    /// `Scroll` here is the two-finger volume pose.
    pub fn classify_secondary(&self, lm: &HandLandmarks) -> Gesture {
        if !lm.is_complete() {
            return Gesture::None;
        }
        if self.is_fist(lm) {
            return Gesture::Fist;
        }
        if self.dictation && self.is_dictation_pinch(lm) {
            return Gesture::DictationPinch;
        }
        if self.is_three_finger_pinch(lm) {
            return Gesture::Mute3Finger;
        }
        if self.is_left_pinch(lm) {
            return Gesture::MediaPinch;
        }
        if self.is_scroll(lm) {
            return Gesture::Scroll;
        }
        Gesture::Move
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builder for synthetic hands: every finger starts curled (tip below its
    /// PIP) with the thumb tucked, fingertips spread far apart.
    pub(crate) struct HandBuilder {
        pts: Vec<Point>,
    }

    impl HandBuilder {
        pub(crate) fn curled() -> Self {
            let mut pts = vec![Point::new(0, 0); 21];
            pts[0] = Point::new(300, 400);
            pts[9] = Point::new(300, 300);
            // thumb: tip close to pip on x
            pts[THUMB_PIP] = Point::new(200, 300);
            pts[THUMB_TIP] = Point::new(210, 320);
            // other fingers: tip below pip, far apart horizontally
            for (i, (pip, tip)) in [(INDEX_PIP, INDEX_TIP), (MIDDLE_PIP, MIDDLE_TIP), (RING_PIP, RING_TIP), (PINKY_PIP, PINKY_TIP)]
                .into_iter()
                .enumerate()
            {
                let x = 400 + 100 * i as i32;
                pts[pip] = Point::new(x, 200);
                pts[tip] = Point::new(x, 230);
            }
            Self { pts }
        }

        pub(crate) fn raise(mut self, finger: Finger) -> Self {
            let pip = self.pts[finger.pip()];
            self.pts[finger.tip()] = match finger {
                Finger::Thumb => Point::new(pip.x - 60, pip.y),
                _ => Point::new(pip.x, pip.y - 60),
            };
            self
        }

        pub(crate) fn tip(mut self, finger: Finger, p: Point) -> Self {
            self.pts[finger.tip()] = p;
            self
        }

        pub(crate) fn point(mut self, idx: usize, p: Point) -> Self {
            self.pts[idx] = p;
            self
        }

        pub(crate) fn build(self) -> HandLandmarks {
            HandLandmarks::new(self.pts)
        }
    }

    pub(crate) fn classifier(threshold: f32) -> GestureClassifier {
        GestureClassifier::new(
            &GestureSettings {
                pinch_threshold: threshold,
                stable_frames: 10,
                global_pause_distance: 50.0,
            },
            true,
        )
    }

    #[test]
    fn all_curled_is_fist() {
        let c = classifier(20.0);
        assert_eq!(c.classify(&HandBuilder::curled().build()), Gesture::Fist);
    }

    #[test]
    fn fist_wins_over_pinches() {
        let c = classifier(20.0);
        // every tip bunched together but all below their PIPs and thumb tucked
        let lm = HandBuilder::curled()
            .point(THUMB_PIP, Point::new(500, 200))
            .tip(Finger::Thumb, Point::new(500, 230))
            .tip(Finger::Index, Point::new(505, 232))
            .tip(Finger::Middle, Point::new(495, 235))
            .build();
        assert!(c.is_three_finger_pinch(&lm));
        assert_eq!(c.classify(&lm), Gesture::Fist);
    }

    #[test]
    fn thumb_extension_is_lateral() {
        let c = classifier(20.0);
        let lm = HandBuilder::curled().raise(Finger::Thumb).build();
        assert!(c.is_finger_up(&lm, Finger::Thumb));
        assert_eq!(c.fingers_up(&lm), vec![Finger::Thumb]);
        assert_eq!(c.classify(&lm), Gesture::Move);
    }

    #[test]
    fn v_sign_is_scroll_even_while_pinching() {
        let c = classifier(20.0);
        let b = HandBuilder::curled().raise(Finger::Index).raise(Finger::Middle);
        assert_eq!(c.classify(&b.build()), Gesture::Scroll);

        // thumb right next to the raised index tip
        let lm = HandBuilder::curled()
            .raise(Finger::Index)
            .raise(Finger::Middle)
            .tip(Finger::Thumb, Point::new(395, 140))
            .build();
        assert!(c.is_left_pinch(&lm));
        assert_eq!(c.classify(&lm), Gesture::Scroll);
    }

    // Curled fingertips rest on y=230 at x=400/500/600/700. Moving the thumb
    // tip out there extends it laterally, so these hands are never fists.

    #[test]
    fn thumb_index_pinch_is_left_click() {
        let c = classifier(20.0);
        let lm = HandBuilder::curled().tip(Finger::Thumb, Point::new(410, 230)).build();
        assert_eq!(c.classify(&lm), Gesture::LeftClick);
    }

    #[test]
    fn thumb_middle_pinch_is_right_click() {
        let c = classifier(20.0);
        let lm = HandBuilder::curled().tip(Finger::Thumb, Point::new(510, 230)).build();
        assert_eq!(c.classify(&lm), Gesture::RightClick);
    }

    #[test]
    fn three_tips_together_is_double_click() {
        let c = classifier(20.0);
        let lm = HandBuilder::curled()
            .tip(Finger::Thumb, Point::new(410, 230))
            .tip(Finger::Middle, Point::new(420, 230))
            .build();
        assert_eq!(c.classify(&lm), Gesture::DoubleClick);
    }

    #[test]
    fn vertical_guard_rejects_tall_pinch() {
        let c = classifier(200.0);
        let a = Point::new(0, 0);
        let b = Point::new(0, 60);
        assert!(!c.is_pinch(a, b));
        assert!(c.is_pinch(a, Point::new(40, 10)));
    }

    #[test]
    fn partial_hand_is_none_everywhere() {
        let c = classifier(20.0);
        let lm = HandLandmarks::new(vec![Point::new(1, 1); 12]);
        assert_eq!(c.classify(&lm), Gesture::None);
        assert_eq!(c.classify_secondary(&lm), Gesture::None);
        assert!(!c.is_fist(&lm));
        assert!(!c.is_scroll(&lm));
        assert!(!c.is_left_pinch(&lm));
        assert!(!c.is_global_pause(Some(&lm), Some(&lm)));
    }

    #[test]
    fn secondary_hand_priorities() {
        let c = classifier(20.0);
        let mute = HandBuilder::curled()
            .tip(Finger::Thumb, Point::new(410, 230))
            .tip(Finger::Middle, Point::new(420, 230))
            .build();
        assert_eq!(c.classify_secondary(&mute), Gesture::Mute3Finger);

        let media = HandBuilder::curled().tip(Finger::Thumb, Point::new(410, 230)).build();
        assert_eq!(c.classify_secondary(&media), Gesture::MediaPinch);

        let volume = HandBuilder::curled().raise(Finger::Index).raise(Finger::Middle).build();
        assert_eq!(c.classify_secondary(&volume), Gesture::Scroll);

        let dictation = HandBuilder::curled().tip(Finger::Thumb, Point::new(700, 260)).build();
        assert_eq!(c.classify_secondary(&dictation), Gesture::DictationPinch);

        assert_eq!(c.classify_secondary(&HandBuilder::curled().build()), Gesture::Fist);
    }

    #[test]
    fn dictation_pinch_ignored_when_disabled() {
        let c = GestureClassifier::new(
            &GestureSettings {
                pinch_threshold: 20.0,
                stable_frames: 10,
                global_pause_distance: 50.0,
            },
            false,
        );
        let lm = HandBuilder::curled().tip(Finger::Thumb, Point::new(700, 260)).build();
        assert!(c.is_dictation_pinch(&lm));
        assert_eq!(c.classify_secondary(&lm), Gesture::Move);
    }

    #[test]
    fn global_pause_needs_both_index_tips_close() {
        let c = classifier(20.0);
        let l = HandBuilder::curled().tip(Finger::Index, Point::new(300, 100)).build();
        let near = HandBuilder::curled().tip(Finger::Index, Point::new(340, 100)).build();
        let far = HandBuilder::curled().tip(Finger::Index, Point::new(360, 100)).build();
        assert!(c.is_global_pause(Some(&l), Some(&near)));
        assert!(!c.is_global_pause(Some(&l), Some(&far)));
        assert!(!c.is_global_pause(Some(&l), None));
    }
}
