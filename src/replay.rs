//! Feed recorded event traces through a tracker.
//!
//! A trace is JSON lines, one event per line, each tagged with `kind` and a
//! millisecond timestamp `t`:
//!
//! ```text
//! {"kind":"move","t":0,"x":400,"y":400,"target":{"x":20,"y":20,"width":120,"height":40}}
//! {"kind":"scroll","t":250,"scroll_y":100}
//! {"kind":"click","t":900,"x":80,"y":40}
//! {"kind":"selection","t":1000,"active":true}
//! {"kind":"resize","t":1200,"width":1920,"height":1080}
//! {"kind":"tick","t":1500}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::activity::UserState;
use crate::config::Tuning;
use crate::error::IntentError;
use crate::geometry::Point;
use crate::intent::{IntentTracker, Surface};
use crate::target::{TargetRect, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TraceTarget {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub center_x: Option<f64>,
    #[serde(default)]
    pub center_y: Option<f64>,
}

impl From<TraceTarget> for TargetRect {
    fn from(t: TraceTarget) -> Self {
        let rect = TargetRect::new(t.x, t.y, t.width, t.height);
        let (cx, cy) = (
            t.center_x.unwrap_or(rect.center_x),
            t.center_y.unwrap_or(rect.center_y),
        );
        rect.with_center(cx, cy)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceEvent {
    Move {
        t: u64,
        x: f64,
        y: f64,
        #[serde(default)]
        target: Option<TraceTarget>,
    },
    Scroll {
        t: u64,
        scroll_y: f64,
    },
    Click {
        t: u64,
        x: f64,
        y: f64,
    },
    Selection {
        t: u64,
        active: bool,
    },
    Resize {
        t: u64,
        width: f64,
        height: f64,
    },
    Tick {
        t: u64,
    },
}

impl TraceEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            TraceEvent::Move { t, .. }
            | TraceEvent::Scroll { t, .. }
            | TraceEvent::Click { t, .. }
            | TraceEvent::Selection { t, .. }
            | TraceEvent::Resize { t, .. }
            | TraceEvent::Tick { t } => *t,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TraceEvent::Move { .. } => "move",
            TraceEvent::Scroll { .. } => "scroll",
            TraceEvent::Click { .. } => "click",
            TraceEvent::Selection { .. } => "selection",
            TraceEvent::Resize { .. } => "resize",
            TraceEvent::Tick { .. } => "tick",
        }
    }
}

/// Parse a whole trace; errors name the offending line.
pub fn parse_trace(text: &str) -> Result<Vec<(usize, TraceEvent)>> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ev: TraceEvent =
            serde_json::from_str(line).map_err(|e| anyhow!("line {}: {e}", i + 1))?;
        out.push((i + 1, ev));
    }
    Ok(out)
}

/// Host stand-in whose viewport and selection are set by trace events.
#[derive(Clone)]
struct TraceSurface {
    viewport: Rc<Cell<Viewport>>,
    selection: Rc<Cell<bool>>,
}

impl Surface for TraceSurface {
    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn has_selection(&self) -> bool {
        self.selection.get()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayStep {
    pub line: usize,
    pub t: u64,
    pub kind: &'static str,
    pub score: f64,
    pub changed: bool,
    pub intent: bool,
    pub state: UserState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    pub events: usize,
    pub rejected: usize,
    pub notifications: usize,
    pub peak_score: f64,
    pub final_score: f64,
    /// `(t, has_intent)` every time the threshold is crossed.
    pub crossings: Vec<(u64, bool)>,
}

pub struct Replayer {
    tracker: IntentTracker,
    surface: TraceSurface,
    notifications: Rc<Cell<usize>>,
    threshold: f64,
    had_intent: bool,
    report: ReplayReport,
}

impl Replayer {
    pub fn new(tuning: Tuning, viewport: Viewport, threshold: f64) -> Result<Self> {
        let surface = TraceSurface {
            viewport: Rc::new(Cell::new(viewport)),
            selection: Rc::new(Cell::new(false)),
        };
        let mut tracker = IntentTracker::create(tuning, surface.clone())?;
        let notifications = Rc::new(Cell::new(0usize));
        let n = notifications.clone();
        tracker.on_intent_change(move |_| n.set(n.get() + 1));

        Ok(Self {
            tracker,
            surface,
            notifications,
            threshold,
            had_intent: false,
            report: ReplayReport::default(),
        })
    }

    pub fn tracker(&self) -> &IntentTracker {
        &self.tracker
    }

    /// Apply one event; the tracker is ticked at the event's timestamp first.
    pub fn apply(
        &mut self,
        line: usize,
        ev: &TraceEvent,
    ) -> std::result::Result<ReplayStep, IntentError> {
        let t = ev.timestamp();
        let before = self.tracker.intent_score();
        self.report.events += 1;

        if let Err(e) = self.dispatch(ev, t) {
            self.report.rejected += 1;
            warn!("line {line}: {} event rejected: {e}", ev.kind());
            return Err(e);
        }

        let score = self.tracker.intent_score();
        let intent = self.tracker.has_intent(self.threshold);
        if intent != self.had_intent {
            self.report.crossings.push((t, intent));
            self.had_intent = intent;
        }
        self.report.peak_score = self.report.peak_score.max(score);

        Ok(ReplayStep {
            line,
            t,
            kind: ev.kind(),
            score,
            changed: score != before,
            intent,
            state: self.tracker.user_state(),
        })
    }

    fn dispatch(&mut self, ev: &TraceEvent, t: u64) -> std::result::Result<(), IntentError> {
        match *ev {
            TraceEvent::Selection { active, .. } => self.surface.selection.set(active),
            TraceEvent::Resize { width, height, .. } => {
                let viewport = Viewport::new(width, height);
                viewport.validate()?;
                self.surface.viewport.set(viewport);
            }
            _ => {}
        }
        self.tracker.tick(t)?;

        match *ev {
            TraceEvent::Move { x, y, target, .. } => {
                self.tracker
                    .track_pointer_move(Point::new(x, y), t, target.map(TargetRect::from))
            }
            TraceEvent::Scroll { scroll_y, .. } => self.tracker.track_scroll(scroll_y, t),
            TraceEvent::Click { x, y, .. } => self.tracker.track_click(Point::new(x, y), t),
            TraceEvent::Selection { .. } | TraceEvent::Resize { .. } | TraceEvent::Tick { .. } => {
                Ok(())
            }
        }
    }

    pub fn finish(mut self) -> ReplayReport {
        self.report.notifications = self.notifications.get();
        self.report.final_score = self.tracker.intent_score();
        self.tracker.dispose();
        self.report
    }
}
