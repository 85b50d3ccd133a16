//! Per-frame arbitration between the two hands.
//!
//! The right hand drives the pointer (move, hold-to-click, double click,
//! scroll) and the left hand drives media (volume drag, mute, play/pause,
//! dictation). Toggles fire on rising edges only; a held button is always
//! released before any pause or mode change becomes visible.
//!
//! Order of a frame:
//! 1. hand presence (appearance resets filters, loss releases buttons)
//! 2. two-hand global pause edge
//! 3. right hand, then left hand, unless globally paused

use log::{debug, info, trace};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::actions::{Action, MouseButton};
use crate::config::Profile;
use crate::edge::EdgeTrigger;
use crate::geometry::{Point, midpoint};
use crate::gestures::{Gesture, GestureClassifier};
use crate::landmarks::{FrameHands, Hand, HandLandmarks, INDEX_TIP, PALM_BASE, WRIST};
use crate::mapping::ScreenMapper;
use crate::pointer::AdaptivePointerFilter;
use crate::scroll::ScrollTracker;
use crate::stability::HandStability;
use crate::volume::{VolumeDirection, VolumeDrag};

/// Minimum gap between two double clicks, even across separate poses.
pub const DOUBLE_CLICK_COOLDOWN: Duration = Duration::from_millis(300);

/// Long-lived latches. `left_button_held` and `right_button_held` are never
/// both true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub mouse_paused: bool,
    pub global_paused: bool,
    pub left_enabled: bool,
    pub left_button_held: bool,
    pub right_button_held: bool,
    pub scroll_active: bool,
    pub volume_drag_active: bool,
}

impl SessionState {
    pub fn is_held(&self, button: MouseButton) -> bool {
        match button {
            MouseButton::Left => self.left_button_held,
            MouseButton::Right => self.right_button_held,
        }
    }

    fn set_held(&mut self, button: MouseButton, held: bool) {
        match button {
            MouseButton::Left => self.left_button_held = held,
            MouseButton::Right => self.right_button_held = held,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Edges {
    global_pause: EdgeTrigger,
    right_fist: EdgeTrigger,
    double_click: EdgeTrigger,
    left_fist: EdgeTrigger,
    mute: EdgeTrigger,
    media: EdgeTrigger,
    dictation: EdgeTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HandStatus {
    pub present: bool,
    /// This frame's label (`none` when absent).
    pub gesture: Gesture,
    /// Last label confirmed by the stability window.
    pub confirmed: Gesture,
}

impl Default for HandStatus {
    fn default() -> Self {
        Self {
            present: false,
            gesture: Gesture::None,
            confirmed: Gesture::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub frame: u64,
    #[serde(flatten)]
    pub state: SessionState,
    pub left: HandStatus,
    pub right: HandStatus,
    pub pointer: Option<Point>,
    pub pointer_alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub actions: Vec<Action>,
    pub status: SessionStatus,
}

pub struct Session {
    classifier: GestureClassifier,
    mapper: ScreenMapper,
    pointer: AdaptivePointerFilter,
    scroll: ScrollTracker,
    volume: VolumeDrag,
    stability: HandStability,
    state: SessionState,
    edges: Edges,
    left: HandStatus,
    right: HandStatus,
    last_pointer: Option<Point>,
    last_double_click: Option<Instant>,
    frame: u64,
}

impl Session {
    pub fn new(profile: &Profile) -> Self {
        Self {
            classifier: GestureClassifier::new(&profile.gesture, profile.dictation.enabled),
            mapper: mapper_for(profile),
            pointer: AdaptivePointerFilter::new(profile.pointer),
            scroll: ScrollTracker::new(profile.scroll),
            volume: VolumeDrag::new(profile.volume),
            stability: HandStability::new(profile.gesture.stable_frames),
            state: SessionState::default(),
            edges: Edges::default(),
            left: HandStatus::default(),
            right: HandStatus::default(),
            last_pointer: None,
            last_double_click: None,
            frame: 0,
        }
    }

    /// Swaps tuning in place. Latches, held buttons and filter history survive
    /// unless the stability window length changed.
    pub fn apply_profile(&mut self, profile: &Profile) {
        self.classifier = GestureClassifier::new(&profile.gesture, profile.dictation.enabled);
        self.mapper = mapper_for(profile);
        self.pointer.set_settings(profile.pointer);
        self.scroll.set_settings(profile.scroll);
        self.volume.set_settings(profile.volume);
        if self.stability.get(Hand::Right).window() != profile.gesture.stable_frames.max(1) {
            self.stability.resize(profile.gesture.stable_frames);
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn process_frame(&mut self, hands: &FrameHands, now: Instant) -> FrameOutcome {
        self.frame += 1;
        let mut out = Vec::new();

        // partial hands count as absent
        let right = hands.right.as_ref().filter(|lm| lm.is_complete());
        let left = hands.left.as_ref().filter(|lm| lm.is_complete());
        let right_label = right.map(|lm| self.classifier.classify(lm));
        let left_label = left.map(|lm| self.classifier.classify_secondary(lm));

        self.track_presence(Hand::Right, right_label, &mut out);
        self.track_presence(Hand::Left, left_label, &mut out);

        if let (Some(l), Some(r)) = (left, right) {
            let touching = self.classifier.is_global_pause(Some(l), Some(r));
            if self.edges.global_pause.update(touching) {
                if !self.state.global_paused {
                    self.release_held(&mut out);
                    self.leave_scroll();
                    self.leave_volume();
                }
                self.state.global_paused = !self.state.global_paused;
                info!(
                    "global {}",
                    if self.state.global_paused { "pause" } else { "resume" }
                );
            }
        }

        if !self.state.global_paused {
            if let (Some(lm), Some(label)) = (right, right_label) {
                self.right_hand(lm, label, now, &mut out);
            }
            if let (Some(lm), Some(label)) = (left, left_label) {
                self.left_hand(lm, label, now, &mut out);
            }
        }

        trace!(
            "frame {}: right={} left={} actions={:?}",
            self.frame, self.right.gesture, self.left.gesture, out
        );
        FrameOutcome {
            actions: out,
            status: self.status(),
        }
    }

    /// Releases for every held button; clears the held latches.
    pub fn release_all(&mut self) -> Vec<Action> {
        let mut out = Vec::new();
        self.release_held(&mut out);
        out
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            frame: self.frame,
            state: self.state,
            left: self.left,
            right: self.right,
            pointer: self.last_pointer,
            pointer_alpha: self.pointer.alpha(),
        }
    }

    fn hand_status_mut(&mut self, hand: Hand) -> &mut HandStatus {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    fn track_presence(&mut self, hand: Hand, label: Option<Gesture>, out: &mut Vec<Action>) {
        let was_present = self.hand_status_mut(hand).present;
        match (was_present, label.is_some()) {
            (false, true) => {
                self.stability.get_mut(hand).reset();
                if hand == Hand::Right {
                    self.pointer.reset();
                    self.scroll.reset();
                }
                debug!("{hand} hand appeared");
            }
            (true, false) => {
                match hand {
                    Hand::Right => {
                        self.release_held(out);
                        self.leave_scroll();
                    }
                    Hand::Left => self.leave_volume(),
                }
                debug!("{hand} hand lost");
            }
            _ => {}
        }

        let confirmed = label.and_then(|g| self.stability.observe(hand, g));
        if let Some(g) = confirmed {
            debug!("{hand} hand gesture confirmed: {g}");
        }
        let stable = self.stability.get(hand).confirmed();
        let status = self.hand_status_mut(hand);
        status.present = label.is_some();
        status.gesture = label.unwrap_or(Gesture::None);
        status.confirmed = stable;
    }

    fn right_hand(&mut self, lm: &HandLandmarks, label: Gesture, now: Instant, out: &mut Vec<Action>) {
        if self.edges.right_fist.update(label == Gesture::Fist) {
            if !self.state.mouse_paused {
                self.release_held(out);
                self.leave_scroll();
            }
            self.state.mouse_paused = !self.state.mouse_paused;
            info!(
                "mouse control {}",
                if self.state.mouse_paused { "paused" } else { "resumed" }
            );
        }
        if self.state.mouse_paused {
            return;
        }

        if label == Gesture::Scroll {
            if !self.state.scroll_active {
                self.state.scroll_active = true;
                debug!("scroll mode on");
            }
            self.release_held(out);
            self.edges.double_click.update(false);
            let y = self.mapper.map(lm.at(INDEX_TIP)).y;
            if let Some(amount) = self.scroll.update(y, now) {
                out.push(Action::Scroll(amount));
            }
            return;
        }
        self.leave_scroll();

        let palm = self.mapper.map(midpoint(lm.at(WRIST), lm.at(PALM_BASE)));
        let (x, y) = self.pointer.smooth(palm.x as f64, palm.y as f64);
        let p = Point::new(x.round() as i32, y.round() as i32);
        self.last_pointer = Some(p);
        out.push(Action::MoveTo { x: p.x, y: p.y });

        let double_edge = self.edges.double_click.update(label == Gesture::DoubleClick);
        match label {
            Gesture::DoubleClick => {
                let cooled = self
                    .last_double_click
                    .is_none_or(|at| now.saturating_duration_since(at) >= DOUBLE_CLICK_COOLDOWN);
                if double_edge {
                    self.release_held(out);
                    if cooled {
                        out.push(Action::DoubleClick);
                        self.last_double_click = Some(now);
                        debug!("double click");
                    } else {
                        debug!("double click suppressed by cooldown");
                    }
                }
            }
            Gesture::LeftClick => self.hold(MouseButton::Left, out),
            Gesture::RightClick => self.hold(MouseButton::Right, out),
            _ => self.release_held(out),
        }
    }

    fn left_hand(&mut self, lm: &HandLandmarks, label: Gesture, now: Instant, out: &mut Vec<Action>) {
        if self.edges.left_fist.update(label == Gesture::Fist) {
            self.state.left_enabled = !self.state.left_enabled;
            self.edges.mute.reset();
            self.edges.media.reset();
            self.edges.dictation.reset();
            info!(
                "left hand control {}",
                if self.state.left_enabled { "enabled" } else { "disabled" }
            );
        }
        if !self.state.left_enabled || label == Gesture::Fist {
            self.leave_volume();
            return;
        }

        if self.edges.mute.update(label == Gesture::Mute3Finger) {
            out.push(Action::MuteToggle);
            debug!("mute toggle");
        }
        if self.edges.media.update(label == Gesture::MediaPinch) {
            out.push(Action::MediaPlayPause);
            debug!("media play/pause");
        }
        if self.edges.dictation.update(label == Gesture::DictationPinch) {
            out.push(Action::RequestDictation);
            debug!("dictation requested");
        }

        if label == Gesture::Scroll {
            self.state.volume_drag_active = true;
            let step = self.volume.step();
            match self.volume.update(lm.at(INDEX_TIP).y, now) {
                Some(VolumeDirection::Up) => out.push(Action::VolumeUp(step)),
                Some(VolumeDirection::Down) => out.push(Action::VolumeDown(step)),
                None => {}
            }
        } else {
            self.leave_volume();
        }
    }

    fn hold(&mut self, button: MouseButton, out: &mut Vec<Action>) {
        let other = button.other();
        if self.state.is_held(other) {
            out.push(Action::Release(other));
            self.state.set_held(other, false);
        }
        if !self.state.is_held(button) {
            out.push(Action::Press(button));
            self.state.set_held(button, true);
            debug!("{} button down", button.as_str());
        }
    }

    fn release_held(&mut self, out: &mut Vec<Action>) {
        for b in [MouseButton::Left, MouseButton::Right] {
            if self.state.is_held(b) {
                out.push(Action::Release(b));
                self.state.set_held(b, false);
                debug!("{} button up", b.as_str());
            }
        }
    }

    fn leave_scroll(&mut self) {
        if self.state.scroll_active {
            debug!("scroll mode off");
        }
        self.state.scroll_active = false;
        self.scroll.reset();
    }

    fn leave_volume(&mut self) {
        self.state.volume_drag_active = false;
        self.volume.reset();
    }
}

fn mapper_for(profile: &Profile) -> ScreenMapper {
    ScreenMapper::new(
        profile.active_area,
        profile.camera.as_tuple(),
        profile.screen.as_tuple(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gestures::Finger;
    use crate::gestures::tests::HandBuilder;
    use crate::landmarks::{INDEX_PIP, MIDDLE_PIP};
    use std::time::Duration;

    fn session() -> Session {
        Session::new(&Profile::default())
    }

    fn right(lm: HandLandmarks) -> FrameHands {
        FrameHands::new().with(Hand::Right, lm)
    }

    fn left(lm: HandLandmarks) -> FrameHands {
        FrameHands::new().with(Hand::Left, lm)
    }

    fn open_hand() -> HandLandmarks {
        HandBuilder::curled().raise(Finger::Thumb).build()
    }

    fn left_pinch() -> HandLandmarks {
        HandBuilder::curled().tip(Finger::Thumb, Point::new(410, 230)).build()
    }

    fn right_pinch() -> HandLandmarks {
        HandBuilder::curled().tip(Finger::Thumb, Point::new(510, 230)).build()
    }

    fn three_pinch() -> HandLandmarks {
        HandBuilder::curled()
            .tip(Finger::Thumb, Point::new(410, 230))
            .tip(Finger::Middle, Point::new(420, 230))
            .build()
    }

    fn fist() -> HandLandmarks {
        HandBuilder::curled().build()
    }

    /// Index and middle raised with their tips at camera height `y`.
    fn v_pose(y: i32) -> HandLandmarks {
        HandBuilder::curled()
            .point(INDEX_PIP, Point::new(400, 320))
            .point(MIDDLE_PIP, Point::new(500, 320))
            .tip(Finger::Index, Point::new(400, y))
            .tip(Finger::Middle, Point::new(500, y))
            .build()
    }

    fn clicks(actions: &[Action]) -> Vec<Action> {
        actions
            .iter()
            .copied()
            .filter(|a| !matches!(a, Action::MoveTo { .. }))
            .collect()
    }

    #[test]
    fn open_hand_moves_pointer_every_frame() {
        let mut s = session();
        let t = Instant::now();
        for i in 0..3 {
            let o = s.process_frame(&right(open_hand()), t + Duration::from_millis(33 * i));
            assert_eq!(o.actions.len(), 1);
            assert!(matches!(o.actions[0], Action::MoveTo { .. }));
        }
        assert!(s.status().pointer.is_some());
    }

    #[test]
    fn first_sample_after_reappearance_is_unsmoothed() {
        let mut s = session();
        let t = Instant::now();
        s.process_frame(&right(open_hand()), t);
        s.process_frame(&FrameHands::new(), t);

        let moved = HandBuilder::curled()
            .raise(Finger::Thumb)
            .point(WRIST, Point::new(260, 220))
            .point(PALM_BASE, Point::new(260, 200))
            .build();
        let expected = mapper_for(&Profile::default())
            .map(midpoint(Point::new(260, 220), Point::new(260, 200)));
        let o = s.process_frame(&right(moved), t);
        assert_eq!(o.actions, vec![Action::MoveTo { x: expected.x, y: expected.y }]);
    }

    #[test]
    fn pinch_holds_until_released() {
        let mut s = session();
        let t = Instant::now();
        assert_eq!(clicks(&s.process_frame(&right(left_pinch()), t).actions), vec![Action::Press(MouseButton::Left)]);
        for _ in 0..5 {
            assert!(clicks(&s.process_frame(&right(left_pinch()), t).actions).is_empty());
        }
        assert!(s.state().left_button_held);
        assert_eq!(
            clicks(&s.process_frame(&right(open_hand()), t).actions),
            vec![Action::Release(MouseButton::Left)]
        );
        assert!(!s.state().left_button_held);
    }

    #[test]
    fn switching_buttons_releases_first() {
        let mut s = session();
        let t = Instant::now();
        s.process_frame(&right(left_pinch()), t);
        let o = s.process_frame(&right(right_pinch()), t);
        assert_eq!(
            clicks(&o.actions),
            vec![Action::Release(MouseButton::Left), Action::Press(MouseButton::Right)]
        );
        assert!(!(o.status.state.left_button_held && o.status.state.right_button_held));
    }

    #[test]
    fn double_click_fires_once_per_pose() {
        let mut s = session();
        let t = Instant::now();
        s.process_frame(&right(left_pinch()), t);
        let o = s.process_frame(&right(three_pinch()), t);
        assert_eq!(
            clicks(&o.actions),
            vec![Action::Release(MouseButton::Left), Action::DoubleClick]
        );
        for _ in 0..4 {
            assert!(clicks(&s.process_frame(&right(three_pinch()), t).actions).is_empty());
        }
        let later = t + DOUBLE_CLICK_COOLDOWN;
        s.process_frame(&right(open_hand()), later);
        assert_eq!(clicks(&s.process_frame(&right(three_pinch()), later).actions), vec![Action::DoubleClick]);
    }

    #[test]
    fn double_click_respects_cooldown_between_poses() {
        let mut s = session();
        let t = Instant::now();
        let ms = Duration::from_millis;
        assert_eq!(clicks(&s.process_frame(&right(three_pinch()), t).actions), vec![Action::DoubleClick]);

        // quick re-pinch inside the cooldown is swallowed, and holding it does not fire late
        s.process_frame(&right(open_hand()), t + ms(100));
        assert!(clicks(&s.process_frame(&right(three_pinch()), t + ms(200)).actions).is_empty());
        assert!(clicks(&s.process_frame(&right(three_pinch()), t + ms(400)).actions).is_empty());

        s.process_frame(&right(open_hand()), t + ms(450));
        assert_eq!(
            clicks(&s.process_frame(&right(three_pinch()), t + ms(500)).actions),
            vec![Action::DoubleClick]
        );
    }

    #[test]
    fn fist_toggles_mouse_pause_once_per_hold() {
        let mut s = session();
        let t = Instant::now();
        s.process_frame(&right(left_pinch()), t);

        let o = s.process_frame(&right(fist()), t);
        assert_eq!(o.actions, vec![Action::Release(MouseButton::Left)]);
        assert!(o.status.state.mouse_paused);
        for _ in 0..5 {
            let o = s.process_frame(&right(fist()), t);
            assert!(o.actions.is_empty());
            assert!(o.status.state.mouse_paused);
        }
        // paused: pinches do nothing
        assert!(s.process_frame(&right(left_pinch()), t).actions.is_empty());

        let o = s.process_frame(&right(fist()), t);
        assert!(!o.status.state.mouse_paused);
        assert!(s.process_frame(&right(open_hand()), t).actions.len() == 1);
    }

    #[test]
    fn global_pause_releases_before_pausing() {
        let mut s = session();
        let t = Instant::now();
        let pinching = HandBuilder::curled()
            .tip(Finger::Index, Point::new(320, 100))
            .tip(Finger::Thumb, Point::new(325, 105))
            .build();
        let pointing = HandBuilder::curled()
            .raise(Finger::Thumb)
            .tip(Finger::Index, Point::new(300, 100))
            .build();
        let o = s.process_frame(&right(pinching.clone()), t);
        assert_eq!(clicks(&o.actions), vec![Action::Press(MouseButton::Left)]);

        let both = FrameHands::new()
            .with(Hand::Right, pinching.clone())
            .with(Hand::Left, pointing.clone());
        let o = s.process_frame(&both, t);
        assert_eq!(o.actions, vec![Action::Release(MouseButton::Left)]);
        assert!(o.status.state.global_paused);
        assert!(!o.status.state.left_button_held);

        // held pose does not re-toggle; every hand is bypassed
        for _ in 0..3 {
            let o = s.process_frame(&both, t);
            assert!(o.actions.is_empty());
            assert!(o.status.state.global_paused);
        }
        assert!(s.process_frame(&right(open_hand()), t).actions.is_empty());

        // the edge only re-arms once both hands are seen apart
        let apart = FrameHands::new()
            .with(Hand::Right, pinching)
            .with(Hand::Left, HandBuilder::curled().raise(Finger::Thumb).tip(Finger::Index, Point::new(100, 100)).build());
        assert!(s.process_frame(&both, t).actions.is_empty());
        assert!(s.process_frame(&apart, t).actions.is_empty());
        let o = s.process_frame(&both, t);
        assert!(!o.status.state.global_paused);
    }

    #[test]
    fn scroll_suppresses_pointer_and_buttons() {
        let mut s = session();
        let t = Instant::now();
        s.process_frame(&right(left_pinch()), t);

        let o = s.process_frame(&right(v_pose(300)), t + Duration::from_millis(10));
        assert_eq!(o.actions, vec![Action::Release(MouseButton::Left)]);
        assert!(o.status.state.scroll_active);

        let o = s.process_frame(&right(v_pose(280)), t + Duration::from_millis(100));
        assert_eq!(o.actions, vec![Action::Scroll(7)]);

        let o = s.process_frame(&right(open_hand()), t + Duration::from_millis(200));
        assert!(!o.status.state.scroll_active);
        assert!(matches!(o.actions[..], [Action::MoveTo { .. }]));
    }

    #[test]
    fn left_hand_needs_enabling() {
        let mut s = session();
        let t = Instant::now();
        assert!(s.process_frame(&left(three_pinch()), t).actions.is_empty());

        let o = s.process_frame(&left(fist()), t);
        assert!(o.status.state.left_enabled);
        assert!(o.actions.is_empty());

        let mut fired = Vec::new();
        for _ in 0..4 {
            fired.extend(s.process_frame(&left(three_pinch()), t).actions);
        }
        assert_eq!(fired, vec![Action::MuteToggle]);

        let mut fired = Vec::new();
        for _ in 0..4 {
            fired.extend(s.process_frame(&left(left_pinch()), t).actions);
        }
        assert_eq!(fired, vec![Action::MediaPlayPause]);

        s.process_frame(&left(open_hand()), t);
        let o = s.process_frame(&left(fist()), t);
        assert!(!o.status.state.left_enabled);
        assert!(s.process_frame(&left(left_pinch()), t).actions.is_empty());
    }

    #[test]
    fn volume_drag_repeats_with_cooldown() {
        let mut s = session();
        let t = Instant::now();
        let ms = Duration::from_millis;
        s.process_frame(&left(fist()), t);

        let high = |y: i32| {
            HandBuilder::curled()
                .tip(Finger::Index, Point::new(400, y))
                .tip(Finger::Middle, Point::new(500, y))
                .build()
        };
        let o = s.process_frame(&left(high(150)), t);
        assert!(o.actions.is_empty());
        assert!(o.status.state.volume_drag_active);

        assert_eq!(s.process_frame(&left(high(110)), t + ms(10)).actions, vec![Action::VolumeUp(4)]);
        assert!(s.process_frame(&left(high(110)), t + ms(60)).actions.is_empty());
        assert_eq!(s.process_frame(&left(high(110)), t + ms(200)).actions, vec![Action::VolumeUp(4)]);

        // breaking the pose drops the reference
        let o = s.process_frame(&left(open_hand()), t + ms(400));
        assert!(!o.status.state.volume_drag_active);
        assert!(s.process_frame(&left(high(110)), t + ms(600)).actions.is_empty());
    }

    #[test]
    fn lowering_the_volume_pose_turns_volume_down() {
        let mut s = session();
        let t = Instant::now();
        let ms = Duration::from_millis;
        s.process_frame(&left(fist()), t);

        assert!(s.process_frame(&left(v_pose(200)), t).actions.is_empty());
        // inside the dead band
        assert!(s.process_frame(&left(v_pose(225)), t + ms(10)).actions.is_empty());
        assert_eq!(s.process_frame(&left(v_pose(250)), t + ms(20)).actions, vec![Action::VolumeDown(4)]);
        assert!(s.process_frame(&left(v_pose(250)), t + ms(100)).actions.is_empty());
        assert_eq!(s.process_frame(&left(v_pose(250)), t + ms(200)).actions, vec![Action::VolumeDown(4)]);

        // the right hand never drives volume
        let o = s.process_frame(&right(v_pose(250)), t + ms(400));
        assert!(!o.actions.iter().any(|a| matches!(a, Action::VolumeDown(_))));
    }

    #[test]
    fn losing_right_hand_releases_button() {
        let mut s = session();
        let t = Instant::now();
        s.process_frame(&right(right_pinch()), t);
        let o = s.process_frame(&FrameHands::new(), t);
        assert_eq!(o.actions, vec![Action::Release(MouseButton::Right)]);
        assert!(!o.status.right.present);
    }

    #[test]
    fn partial_hand_is_absent() {
        let mut s = session();
        let partial = HandLandmarks::new(vec![Point::new(300, 300); 10]);
        let o = s.process_frame(&right(partial), Instant::now());
        assert!(o.actions.is_empty());
        assert!(!o.status.right.present);
    }

    #[test]
    fn dictation_pinch_requests_once() {
        let mut p = Profile::default();
        p.dictation.enabled = true;
        p.dictation.command = vec!["true".into()];
        p.meta.allow_commands = true;
        let mut s = Session::new(&p);
        let t = Instant::now();
        s.process_frame(&left(fist()), t);
        let pose = HandBuilder::curled().tip(Finger::Thumb, Point::new(700, 260)).build();
        let mut fired = Vec::new();
        for _ in 0..5 {
            fired.extend(s.process_frame(&left(pose.clone()), t).actions);
        }
        assert_eq!(fired, vec![Action::RequestDictation]);
    }

    #[test]
    fn stability_confirms_for_status() {
        let mut p = Profile::default();
        p.gesture.stable_frames = 3;
        let mut s = Session::new(&p);
        let t = Instant::now();
        s.process_frame(&right(open_hand()), t);
        s.process_frame(&right(open_hand()), t);
        assert_eq!(s.status().right.confirmed, Gesture::None);
        let o = s.process_frame(&right(open_hand()), t);
        assert_eq!(o.status.right.confirmed, Gesture::Move);
        assert_eq!(o.status.right.gesture, Gesture::Move);
    }

    #[test]
    fn release_all_clears_latches() {
        let mut s = session();
        s.process_frame(&right(left_pinch()), Instant::now());
        assert_eq!(s.release_all(), vec![Action::Release(MouseButton::Left)]);
        assert!(s.release_all().is_empty());
    }
}
