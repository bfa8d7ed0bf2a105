//! Coarse classification of what the user is doing right now.

use serde::Serialize;

use crate::config::Activity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    #[default]
    Idle,
    Reading,
    Selecting,
    Scrolling,
    Navigating,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::Idle => "idle",
            UserState::Reading => "reading",
            UserState::Selecting => "selecting",
            UserState::Scrolling => "scrolling",
            UserState::Navigating => "navigating",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    #[default]
    None,
}

#[derive(Debug)]
pub struct ActivityClassifier {
    th: Activity,
    state: UserState,
    selecting: bool,
    small_moves: u32,
    last_activity_ms: Option<u64>,
    last_scroll_ms: Option<u64>,
}

impl ActivityClassifier {
    pub fn new(th: Activity) -> Self {
        Self {
            th,
            state: UserState::Idle,
            selecting: false,
            small_moves: 0,
            last_activity_ms: None,
            last_scroll_ms: None,
        }
    }

    pub fn set_thresholds(&mut self, th: Activity) {
        self.th = th;
    }

    pub fn state(&self) -> UserState {
        self.state
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    pub fn small_moves(&self) -> u32 {
        self.small_moves
    }

    pub fn last_scroll_ms(&self) -> Option<u64> {
        self.last_scroll_ms
    }

    /// Re-evaluate after a pointer sample.
    ///
    /// Updates closer together than `min_interval_ms` are ignored entirely,
    /// including the small-movement counter.
    pub fn on_pointer_sample(&mut self, now: u64, step_px: f64, speed: f64) -> UserState {
        if let Some(last) = self.last_activity_ms {
            if now.saturating_sub(last) < self.th.min_interval_ms {
                return self.state;
            }
        }

        if step_px < self.th.small_move_px {
            self.small_moves = self.small_moves.saturating_add(1);
        } else {
            self.small_moves = self.small_moves.saturating_sub(1);
        }

        let scrolled_recently = self
            .last_scroll_ms
            .is_some_and(|t| now.saturating_sub(t) < self.th.scrolling_window_ms);
        let quiet = self
            .last_activity_ms
            .is_some_and(|t| now.saturating_sub(t) > self.th.idle_ms);

        if self.selecting {
            self.state = UserState::Selecting;
        } else if scrolled_recently {
            self.state = UserState::Scrolling;
        } else if self.small_moves > self.th.reading_moves {
            self.state = UserState::Reading;
        } else if speed > self.th.navigating_speed {
            self.state = UserState::Navigating;
        } else if quiet {
            self.state = UserState::Idle;
        }

        self.last_activity_ms = Some(now);
        self.state
    }

    /// Scrolls do not count as pointer activity for the min-interval gate.
    pub fn on_scroll(&mut self, now: u64) -> UserState {
        self.last_scroll_ms = Some(now);
        if !self.selecting {
            self.state = UserState::Scrolling;
        }
        self.state
    }

    /// Periodic selection re-check; selections change without pointer motion.
    pub fn on_selection_check(&mut self, now: u64, has_selection: bool) -> UserState {
        self.selecting = has_selection;
        if has_selection {
            self.state = UserState::Selecting;
            self.last_activity_ms = Some(now);
        } else if self.state == UserState::Selecting {
            self.state = UserState::Idle;
        }
        self.state
    }
}
