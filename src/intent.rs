//! Predictive button-intent tracking.
//!
//! [`IntentTracker`] consumes pointer, scroll and click samples together with
//! the geometry of one watched element and keeps a 0–100 estimate of whether
//! the user is about to interact with it. Hosts drive it from their event loop
//! and call [`IntentTracker::tick`] periodically so selection changes that
//! happen without pointer motion are noticed.

use log::{debug, trace};
use serde::Serialize;

use crate::activity::{ActivityClassifier, ScrollDirection, UserState};
use crate::config::Tuning;
use crate::error::{IntentError, Result, finite};
use crate::geometry::{Point, Vector, segment_intersects_rect};
use crate::scoring::{self, ScoreBreakdown, ScoreInputs};
use crate::target::{TargetRect, Viewport};
use crate::tracker::{Motion, PointerWindow};

/// What the tracker needs from the page hosting the watched element.
pub trait Surface {
    fn viewport(&self) -> Viewport;

    /// True while a non-collapsed, non-empty text selection exists.
    fn has_selection(&self) -> bool;
}

/// A surface with a fixed viewport and no selection support.
#[derive(Debug, Clone, Copy)]
pub struct StaticSurface(pub Viewport);

impl Surface for StaticSurface {
    fn viewport(&self) -> Viewport {
        self.0
    }

    fn has_selection(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(f64)>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Trajectory {
    pub projected: Point,
    pub projected_distance: f64,
    pub approaching: bool,
    pub intersects: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DwellState {
    pub dwelling: bool,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub threshold: f64,
}

/// Selection polling schedule; `None` once cancelled.
#[derive(Debug, Clone, Copy)]
struct SelectionPoll {
    interval_ms: u64,
    next_due_ms: Option<u64>,
}

pub struct IntentTracker {
    tuning: Tuning,
    surface: Option<Box<dyn Surface>>,
    poll: Option<SelectionPoll>,
    viewport: Viewport,

    window: PointerWindow,
    target: TargetRect,
    distance: f64,
    alignment: f64,
    trajectory: Trajectory,
    dwell: DwellState,
    activity: ActivityClassifier,

    scroll_y: f64,
    scroll_direction: ScrollDirection,
    last_click_ms: Option<u64>,
    now_ms: u64,

    button_score: f64,
    reading_score: f64,
    exploring_score: f64,
    last_breakdown: ScoreBreakdown,

    subscribers: Vec<(SubscriptionId, Callback)>,
    next_subscription: u64,
    disposed: bool,
}

impl std::fmt::Debug for IntentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentTracker")
            .field("button_score", &self.button_score)
            .field("user_state", &self.activity.state())
            .field("subscribers", &self.subscribers.len())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl IntentTracker {
    /// Build a tracker bound to `surface`, watching the default target.
    pub fn create(tuning: Tuning, surface: impl Surface + 'static) -> Result<Self> {
        let viewport = surface.viewport();
        viewport.validate()?;

        let target = TargetRect::default();
        let poll = SelectionPoll {
            interval_ms: tuning.activity.selection_poll_ms.max(1),
            next_due_ms: None,
        };
        let dwell = DwellState {
            threshold: target.dwell_threshold(tuning.kinematics.dwell_factor),
            ..Default::default()
        };

        debug!(
            "intent tracker created (viewport {}x{}, selection poll {}ms)",
            viewport.width, viewport.height, poll.interval_ms
        );

        Ok(Self {
            window: PointerWindow::new(tuning.kinematics.history_capacity),
            activity: ActivityClassifier::new(tuning.activity.clone()),
            tuning,
            surface: Some(Box::new(surface)),
            poll: Some(poll),
            viewport,
            target,
            distance: 0.0,
            alignment: 0.0,
            trajectory: Trajectory::default(),
            dwell,
            scroll_y: 0.0,
            scroll_direction: ScrollDirection::None,
            last_click_ms: None,
            now_ms: 0,
            button_score: 0.0,
            reading_score: 0.0,
            exploring_score: 0.0,
            last_breakdown: ScoreBreakdown::default(),
            subscribers: Vec::new(),
            next_subscription: 0,
            disposed: false,
        })
    }

    /// Cancel the selection poll, release the surface and drop all subscribers.
    ///
    /// Idempotent. Every later event returns [`IntentError::Disposed`]; the
    /// score stays readable.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.poll = None;
        self.surface = None;
        self.subscribers.clear();
        self.disposed = true;
        debug!("intent tracker disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Swap in a new tuning profile; history and scores are kept.
    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.window.set_capacity(tuning.kinematics.history_capacity);
        self.activity.set_thresholds(tuning.activity.clone());
        self.dwell.threshold = self.target.dwell_threshold(tuning.kinematics.dwell_factor);
        if let Some(poll) = self.poll.as_mut() {
            poll.interval_ms = tuning.activity.selection_poll_ms.max(1);
        }
        self.tuning = tuning;
        debug!("intent tracker retuned");
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(IntentError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Timer entry point: picks up viewport changes and runs the selection
    /// re-check once its interval has elapsed.
    pub fn tick(&mut self, timestamp_ms: u64) -> Result<()> {
        self.ensure_live()?;
        let Some(surface) = self.surface.as_ref() else {
            return Ok(());
        };
        let viewport = surface.viewport();
        let has_selection = surface.has_selection();

        // a bad viewport report rejects the whole tick
        if viewport != self.viewport {
            self.resize(viewport)?;
        }
        self.now_ms = self.now_ms.max(timestamp_ms);

        if let Some(poll) = self.poll.as_mut() {
            let due = poll.next_due_ms.is_none_or(|t| timestamp_ms >= t);
            if due {
                poll.next_due_ms = Some(timestamp_ms.saturating_add(poll.interval_ms));
                let state = self.activity.on_selection_check(timestamp_ms, has_selection);
                trace!("selection check at {timestamp_ms}: {has_selection} -> {}", state.as_str());
            }
        }
        Ok(())
    }

    pub fn resize(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_live()?;
        viewport.validate()?;
        if viewport != self.viewport {
            debug!("viewport resized to {}x{}", viewport.width, viewport.height);
        }
        self.viewport = viewport;
        Ok(())
    }

    /// Feed one pointer-move sample, optionally with fresh target geometry.
    ///
    /// The supplied target replaces the watched geometry for this and all
    /// later samples. Non-finite input is rejected before any state changes.
    pub fn track_pointer_move(
        &mut self,
        position: Point,
        timestamp_ms: u64,
        target: Option<TargetRect>,
    ) -> Result<()> {
        self.ensure_live()?;
        finite("position.x", position.x)?;
        finite("position.y", position.y)?;
        if let Some(t) = &target {
            t.validate()?;
        }

        self.now_ms = timestamp_ms;
        if let Some(t) = target {
            self.target = t;
            self.dwell.threshold = t.dwell_threshold(self.tuning.kinematics.dwell_factor);
        }

        let motion = self.window.on_sample(position, timestamp_ms);
        self.update_geometry(&motion);
        self.update_dwell(timestamp_ms);

        let state = self
            .activity
            .on_pointer_sample(timestamp_ms, motion.step(), motion.speed);
        self.update_exploring(state);

        self.update_button_score(timestamp_ms, &motion);
        Ok(())
    }

    fn update_geometry(&mut self, motion: &Motion) {
        let center = self.target.center();
        self.distance = motion.position.distance_to(center);

        self.alignment = match (
            motion.position.vector_to(center).normalized(),
            motion.velocity.normalized(),
        ) {
            (Some(to_target), Some(heading)) => to_target.dot(heading).clamp(-1.0, 1.0),
            _ => 0.0,
        };

        let k = &self.tuning.kinematics;
        let projected = motion.position.offset(motion.velocity, k.projection_ms / 1000.0);
        let projected_distance = projected.distance_to(center);
        let zone = self.target.bounds().expanded(k.target_margin_px);

        self.trajectory = Trajectory {
            projected,
            projected_distance,
            approaching: projected_distance < self.distance,
            intersects: segment_intersects_rect(motion.position, projected, zone),
        };
    }

    fn update_dwell(&mut self, now: u64) {
        if self.distance < self.dwell.threshold {
            if !self.dwell.dwelling {
                self.dwell.dwelling = true;
                self.dwell.start_ms = now;
            }
            self.dwell.duration_ms = now.saturating_sub(self.dwell.start_ms);
        } else if self.dwell.dwelling {
            self.dwell.dwelling = false;
            self.dwell.duration_ms = 0;
        }
    }

    fn update_exploring(&mut self, state: UserState) {
        let step = self.tuning.activity.exploring_step;
        self.exploring_score = if state == UserState::Navigating {
            (self.exploring_score + step).min(100.0)
        } else {
            (self.exploring_score - 1.0).max(0.0)
        };
    }

    fn recently(&self, then: Option<u64>, now: u64, window_ms: u64) -> bool {
        then.is_some_and(|t| now.saturating_sub(t) < window_ms)
    }

    fn update_button_score(&mut self, now: u64, motion: &Motion) {
        let p = &self.tuning.penalties;
        let state = self.activity.state();

        let scrolled = self.recently(self.activity.last_scroll_ms(), now, p.scroll_recent_ms);
        // the cursor, not the click, has to be away from the target
        let clicked_elsewhere = self.recently(self.last_click_ms, now, p.click_recent_ms)
            && self.distance > self.target.width * p.click_distance_factor;

        let inputs = ScoreInputs {
            viewport_diagonal: self.viewport.diagonal(),
            distance_to_target: self.distance,
            projected_distance: self.trajectory.projected_distance,
            approaching: self.trajectory.approaching,
            intersects: self.trajectory.intersects,
            alignment: self.alignment,
            dwelling: self.dwell.dwelling,
            dwell_duration_ms: self.dwell.duration_ms,
            speed: motion.speed,
            scrolling: state == UserState::Scrolling || scrolled,
            reading: matches!(state, UserState::Reading | UserState::Selecting),
            selecting: self.activity.is_selecting(),
            clicked_elsewhere,
        };

        let breakdown = scoring::score_pointer_sample(&inputs, &self.tuning);
        let next = scoring::blend(breakdown.raw, self.button_score, &self.tuning.blend);
        self.last_breakdown = breakdown;
        trace!(
            "sample at {now}: raw {:.2} -> {:.2} (was {:.2})",
            breakdown.raw, next, self.button_score
        );

        if (next - self.button_score).abs() > self.tuning.blend.change_epsilon {
            self.button_score = next;
            self.notify();
        }
    }

    /// Record a scroll position; scrolling is strong evidence against button intent.
    pub fn track_scroll(&mut self, scroll_y: f64, timestamp_ms: u64) -> Result<()> {
        self.ensure_live()?;
        finite("scroll_y", scroll_y)?;
        self.now_ms = timestamp_ms;

        let delta = scroll_y - self.scroll_y;
        self.scroll_direction = if delta > 0.0 {
            ScrollDirection::Down
        } else if delta < 0.0 {
            ScrollDirection::Up
        } else {
            ScrollDirection::None
        };
        self.scroll_y = scroll_y;
        self.activity.on_scroll(timestamp_ms);

        let e = &self.tuning.events;
        self.reading_score = (self.reading_score + e.scroll_reading_boost).min(100.0);
        self.button_score = (self.button_score - e.scroll_penalty).max(0.0);
        self.notify();
        Ok(())
    }

    /// Record a click. Clicks in the top band of the viewport boost intent.
    pub fn track_click(&mut self, position: Point, timestamp_ms: u64) -> Result<()> {
        self.ensure_live()?;
        finite("position.x", position.x)?;
        finite("position.y", position.y)?;
        self.now_ms = timestamp_ms;
        self.last_click_ms = Some(timestamp_ms);

        let e = &self.tuning.events;
        if position.y < self.viewport.height / e.click_zone_divisor {
            self.button_score = (self.button_score + e.click_boost).min(100.0);
            self.notify();
        }
        Ok(())
    }

    pub fn intent_score(&self) -> f64 {
        self.button_score
    }

    pub fn has_intent(&self, threshold: f64) -> bool {
        self.button_score >= threshold
    }

    /// [`has_intent`](Self::has_intent) with the profile's default threshold.
    pub fn has_default_intent(&self) -> bool {
        self.has_intent(self.tuning.events.default_threshold)
    }

    pub fn user_state(&self) -> UserState {
        self.activity.state()
    }

    /// Register a callback invoked with the new score whenever it changes.
    pub fn on_intent_change(&mut self, callback: impl FnMut(f64) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        if !self.disposed {
            self.subscribers.push((id, Box::new(callback)));
        }
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self) {
        let score = self.button_score;
        for (_, cb) in self.subscribers.iter_mut() {
            cb(score);
        }
    }

    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let motion = self.window.motion();
        DebugSnapshot {
            now_ms: self.now_ms,
            viewport: self.viewport,
            cursor: CursorSnapshot {
                x: motion.position.x,
                y: motion.position.y,
                velocity: motion.velocity,
                speed: motion.speed,
                history_len: self.window.len(),
            },
            target: TargetSnapshot {
                rect: self.target,
                distance: self.distance,
                alignment: self.alignment,
                dwell: self.dwell,
            },
            trajectory: self.trajectory,
            state: StateSnapshot {
                current: self.activity.state(),
                is_selecting: self.activity.is_selecting(),
                small_movement_count: self.activity.small_moves(),
                scroll_y: self.scroll_y,
                scroll_direction: self.scroll_direction,
                since_scroll_ms: self
                    .activity
                    .last_scroll_ms()
                    .map(|t| self.now_ms.saturating_sub(t)),
                since_click_ms: self.last_click_ms.map(|t| self.now_ms.saturating_sub(t)),
            },
            scores: Scores {
                button: self.button_score,
                reading: self.reading_score,
                exploring: self.exploring_score,
                last_sample: self.last_breakdown,
            },
            disposed: self.disposed,
        }
    }
}

impl Drop for IntentTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugSnapshot {
    pub now_ms: u64,
    pub viewport: Viewport,
    pub cursor: CursorSnapshot,
    pub target: TargetSnapshot,
    pub trajectory: Trajectory,
    pub state: StateSnapshot,
    pub scores: Scores,
    pub disposed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorSnapshot {
    pub x: f64,
    pub y: f64,
    pub velocity: Vector,
    pub speed: f64,
    pub history_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSnapshot {
    pub rect: TargetRect,
    pub distance: f64,
    pub alignment: f64,
    pub dwell: DwellState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub current: UserState,
    pub is_selecting: bool,
    pub small_movement_count: u32,
    pub scroll_y: f64,
    pub scroll_direction: ScrollDirection,
    pub since_scroll_ms: Option<u64>,
    pub since_click_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scores {
    pub button: f64,
    pub reading: f64,
    pub exploring: f64,
    pub last_sample: ScoreBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn tracker() -> IntentTracker {
        IntentTracker::create(Tuning::default(), StaticSurface(Viewport::new(1280.0, 800.0)))
            .unwrap()
    }

    /// Surface whose viewport and selection the test flips at will.
    #[derive(Clone, Default)]
    struct Scripted {
        viewport: Rc<Cell<Option<Viewport>>>,
        selection: Rc<Cell<bool>>,
    }

    impl Surface for Scripted {
        fn viewport(&self) -> Viewport {
            self.viewport.get().unwrap_or_default()
        }

        fn has_selection(&self) -> bool {
            self.selection.get()
        }
    }

    #[test]
    fn rejects_degenerate_viewport() {
        let err = IntentTracker::create(Tuning::default(), StaticSurface(Viewport::new(0.0, 0.0)))
            .unwrap_err();
        assert!(matches!(err, IntentError::InvalidInput { .. }));
    }

    #[test]
    fn starts_at_zero_and_idle() {
        let t = tracker();
        assert_eq!(t.intent_score(), 0.0);
        assert_eq!(t.user_state(), UserState::Idle);
        assert!(!t.has_default_intent());
        assert!(t.has_intent(0.0));
    }

    #[test]
    fn non_finite_input_leaves_state_untouched() {
        let mut t = tracker();
        t.track_pointer_move(Point::new(300.0, 300.0), 0, None).unwrap();
        let before = t.debug_snapshot();

        assert!(matches!(
            t.track_pointer_move(Point::new(f64::NAN, 1.0), 100, None),
            Err(IntentError::InvalidInput { field: "position.x", .. })
        ));
        assert!(
            t.track_pointer_move(
                Point::new(1.0, 1.0),
                100,
                Some(TargetRect::new(0.0, 0.0, f64::INFINITY, 10.0))
            )
            .is_err()
        );
        assert!(t.track_scroll(f64::NEG_INFINITY, 100).is_err());
        assert!(t.track_click(Point::new(1.0, f64::NAN), 100).is_err());

        assert_eq!(t.debug_snapshot(), before);
    }

    #[test]
    fn supplied_target_replaces_geometry_and_dwell_radius() {
        let mut t = tracker();
        let target = TargetRect::new(500.0, 500.0, 200.0, 100.0).with_center(550.0, 520.0);
        t.track_pointer_move(Point::new(560.0, 520.0), 0, Some(target)).unwrap();
        let snap = t.debug_snapshot();
        assert_eq!(snap.target.rect, target);
        assert_eq!(snap.target.dwell.threshold, 150.0);
        assert!((snap.target.distance - 10.0).abs() < 1e-9);
        assert!(snap.target.dwell.dwelling);

        // later samples without a target keep the last one
        t.track_pointer_move(Point::new(900.0, 700.0), 100, None).unwrap();
        assert_eq!(t.debug_snapshot().target.rect, target);
    }

    #[test]
    fn scroll_sets_direction_and_subtracts_penalty() {
        let mut t = tracker();
        // click near the top to lift the score without any pointer samples
        t.track_click(Point::new(80.0, 40.0), 0).unwrap();
        t.track_click(Point::new(80.0, 40.0), 10).unwrap();
        assert_eq!(t.intent_score(), 60.0);

        t.track_scroll(120.0, 20).unwrap();
        assert_eq!(t.intent_score(), 40.0);
        assert_eq!(t.debug_snapshot().state.scroll_direction, ScrollDirection::Down);
        assert_eq!(t.user_state(), UserState::Scrolling);

        t.track_scroll(50.0, 30).unwrap();
        assert_eq!(t.intent_score(), 20.0);
        assert_eq!(t.debug_snapshot().state.scroll_direction, ScrollDirection::Up);

        t.track_scroll(50.0, 40).unwrap();
        assert_eq!(t.debug_snapshot().state.scroll_direction, ScrollDirection::None);
        assert_eq!(t.intent_score(), 0.0);

        // clamped at zero
        t.track_scroll(10.0, 50).unwrap();
        assert_eq!(t.intent_score(), 0.0);
        assert_eq!(t.debug_snapshot().scores.reading, 40.0);
    }

    #[test]
    fn only_clicks_in_upper_third_boost() {
        let mut t = tracker();
        t.track_click(Point::new(600.0, 700.0), 0).unwrap();
        assert_eq!(t.intent_score(), 0.0);
        // 800 / 3 = 266.67
        t.track_click(Point::new(600.0, 266.0), 10).unwrap();
        assert_eq!(t.intent_score(), 30.0);
        for i in 0..5 {
            t.track_click(Point::new(600.0, 10.0), 20 + i).unwrap();
        }
        assert_eq!(t.intent_score(), 100.0);
    }

    #[test]
    fn recent_click_penalizes_a_cursor_away_from_target() {
        let mut t = tracker();
        t.track_click(Point::new(1000.0, 700.0), 0).unwrap();
        t.track_pointer_move(Point::new(1000.0, 700.0), 500, None).unwrap();
        assert_eq!(t.debug_snapshot().scores.last_sample.penalties, 15.0);
        t.track_pointer_move(Point::new(1000.0, 700.0), 1600, None).unwrap();
        assert_eq!(t.debug_snapshot().scores.last_sample.penalties, 0.0);

        // where the click landed does not matter, only where the cursor is
        t.track_click(Point::new(80.0, 40.0), 1700).unwrap();
        t.track_pointer_move(Point::new(1000.0, 700.0), 1800, None).unwrap();
        assert_eq!(t.debug_snapshot().scores.last_sample.penalties, 15.0);
    }

    #[test]
    fn cursor_on_target_after_far_click_is_not_penalized() {
        let mut t = tracker();
        t.track_click(Point::new(1000.0, 700.0), 0).unwrap();
        t.track_pointer_move(Point::new(80.0, 40.0), 500, None).unwrap();
        assert_eq!(t.debug_snapshot().scores.last_sample.penalties, 0.0);

        // 2 x 120px: just inside is fine, just outside is not
        t.track_click(Point::new(1000.0, 700.0), 600).unwrap();
        t.track_pointer_move(Point::new(319.0, 40.0), 700, None).unwrap();
        assert_eq!(t.debug_snapshot().scores.last_sample.penalties, 0.0);
        t.track_pointer_move(Point::new(321.0, 40.0), 800, None).unwrap();
        assert_eq!(t.debug_snapshot().scores.last_sample.penalties, 15.0);
    }

    #[test]
    fn every_subscriber_is_notified_until_unsubscribed() {
        let mut t = tracker();
        let a = Rc::new(Cell::new(0u32));
        let b = Rc::new(Cell::new(0u32));
        let last = Rc::new(Cell::new(-1.0f64));

        let (a2, last2) = (a.clone(), last.clone());
        let id_a = t.on_intent_change(move |s| {
            a2.set(a2.get() + 1);
            last2.set(s);
        });
        let b2 = b.clone();
        t.on_intent_change(move |_| b2.set(b2.get() + 1));

        t.track_click(Point::new(10.0, 10.0), 0).unwrap();
        assert_eq!((a.get(), b.get()), (1, 1));
        assert_eq!(last.get(), 30.0);

        assert!(t.unsubscribe(id_a));
        assert!(!t.unsubscribe(id_a));
        t.track_scroll(40.0, 10).unwrap();
        assert_eq!((a.get(), b.get()), (1, 2));
    }

    #[test]
    fn small_changes_are_not_announced() {
        let mut t = tracker();
        let calls = Rc::new(Cell::new(0u32));
        let c = calls.clone();
        t.on_intent_change(move |_| c.set(c.get() + 1));

        t.track_pointer_move(Point::new(600.0, 500.0), 0, None).unwrap();
        assert_eq!(calls.get(), 1);
        let score = t.intent_score();

        // same spot again: the blended score moves by less than a point
        t.track_pointer_move(Point::new(600.0, 500.0), 50, None).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(t.intent_score(), score);
        assert!(t.debug_snapshot().scores.last_sample.raw > score);
    }

    #[test]
    fn dispose_releases_everything() {
        let mut t = tracker();
        let hits = Rc::new(Cell::new(0u32));
        let h = hits.clone();
        t.on_intent_change(move |_| h.set(h.get() + 1));
        t.track_click(Point::new(10.0, 10.0), 0).unwrap();
        assert_eq!(Rc::strong_count(&hits), 2);

        t.dispose();
        assert!(t.is_disposed());
        assert_eq!(Rc::strong_count(&hits), 1);
        assert_eq!(t.intent_score(), 30.0);

        assert_eq!(
            t.track_pointer_move(Point::new(1.0, 1.0), 10, None),
            Err(IntentError::Disposed)
        );
        assert_eq!(t.track_scroll(1.0, 10), Err(IntentError::Disposed));
        assert_eq!(t.track_click(Point::new(1.0, 1.0), 10), Err(IntentError::Disposed));
        assert_eq!(t.tick(10), Err(IntentError::Disposed));
        assert_eq!(t.resize(Viewport::new(10.0, 10.0)), Err(IntentError::Disposed));

        // disposing twice is harmless
        t.dispose();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn dropping_releases_surface() {
        let surface = Scripted::default();
        let probe = surface.selection.clone();
        let t = IntentTracker::create(Tuning::default(), surface).unwrap();
        assert_eq!(Rc::strong_count(&probe), 2);
        drop(t);
        assert_eq!(Rc::strong_count(&probe), 1);
    }

    #[test]
    fn selection_is_polled_on_interval() {
        let surface = Scripted::default();
        let sel = surface.selection.clone();
        let mut t = IntentTracker::create(Tuning::default(), surface).unwrap();

        t.tick(0).unwrap();
        assert!(!t.debug_snapshot().state.is_selecting);

        sel.set(true);
        t.tick(100).unwrap();
        assert!(!t.debug_snapshot().state.is_selecting);
        t.tick(499).unwrap();
        assert!(!t.debug_snapshot().state.is_selecting);
        t.tick(500).unwrap();
        assert!(t.debug_snapshot().state.is_selecting);
        assert_eq!(t.user_state(), UserState::Selecting);

        sel.set(false);
        t.tick(1000).unwrap();
        assert_eq!(t.user_state(), UserState::Idle);
    }

    #[test]
    fn tick_follows_viewport_changes() {
        let surface = Scripted::default();
        let vp = surface.viewport.clone();
        let mut t = IntentTracker::create(Tuning::default(), surface).unwrap();
        assert_eq!(t.debug_snapshot().viewport, Viewport::default());

        vp.set(Some(Viewport::new(1920.0, 1080.0)));
        t.tick(0).unwrap();
        assert_eq!(t.debug_snapshot().viewport, Viewport::new(1920.0, 1080.0));

        // a broken host report is refused and nothing moves
        vp.set(Some(Viewport::new(-5.0, 1080.0)));
        let before = t.debug_snapshot();
        assert!(t.tick(100).is_err());
        assert_eq!(t.debug_snapshot(), before);
        assert_eq!(before.now_ms, 0);
    }

    #[test]
    fn ticks_near_the_end_of_time_do_not_overflow() {
        let surface = Scripted::default();
        let sel = surface.selection.clone();
        let mut t = IntentTracker::create(Tuning::default(), surface).unwrap();

        t.tick(u64::MAX - 10).unwrap();
        sel.set(true);
        t.tick(u64::MAX - 5).unwrap();
        assert!(!t.debug_snapshot().state.is_selecting);
        // the next poll is pinned at u64::MAX and still fires
        t.tick(u64::MAX).unwrap();
        assert!(t.debug_snapshot().state.is_selecting);
        assert_eq!(t.debug_snapshot().now_ms, u64::MAX);
    }

    #[test]
    fn retuning_shrinks_history() {
        let mut t = tracker();
        for i in 0..10u64 {
            t.track_pointer_move(Point::new(i as f64 * 3.0, 500.0), i * 100, None).unwrap();
        }
        assert_eq!(t.debug_snapshot().cursor.history_len, 10);

        let mut tuning = Tuning::default();
        tuning.kinematics.history_capacity = 4;
        tuning.kinematics.dwell_factor = 1.0;
        t.set_tuning(tuning);
        let snap = t.debug_snapshot();
        assert_eq!(snap.cursor.history_len, 4);
        assert_eq!(snap.target.dwell.threshold, 120.0);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut t = tracker();
        t.track_pointer_move(Point::new(100.0, 100.0), 0, None).unwrap();
        let v = serde_json::to_value(t.debug_snapshot()).unwrap();
        assert_eq!(v["state"]["current"], "idle");
        assert_eq!(v["target"]["rect"]["center_x"], 80.0);
        assert!(v["scores"]["button"].as_f64().unwrap() > 0.0);
        assert!(v["state"]["since_scroll_ms"].is_null());
    }
}
