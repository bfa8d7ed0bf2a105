//! The button-intent score as a pure function of tracker state and tuning.
//!
//! A pointer sample produces a raw score from five components:
//!
//! - proximity: an inverse-distance field over the whole viewport, so every
//!   cursor position carries some intent
//! - trajectory: the 500 ms projection hits the (slightly enlarged) target,
//!   or at least ends closer to it
//! - alignment: cosine between the velocity and the direction to the target,
//!   rewarded more than it is punished
//! - dwell: a log-saturating bonus for lingering near the target
//! - speed: slow movement is rewarded in proportion to proximity, fast
//!   movement is penalized
//!
//! Conflicting activity (scrolling, reading, selecting, clicking elsewhere)
//! subtracts on top. The raw score is then blended with the previous one so
//! the output moves smoothly between samples.

use serde::Serialize;

use crate::config::{Blend, Tuning};

/// Everything the scorer needs to know about one pointer sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInputs {
    pub viewport_diagonal: f64,
    pub distance_to_target: f64,
    pub projected_distance: f64,
    pub approaching: bool,
    pub intersects: bool,
    /// Cosine between velocity and the direction to the target, in [-1, 1].
    pub alignment: f64,
    pub dwelling: bool,
    pub dwell_duration_ms: u64,
    pub speed: f64,
    /// In the scrolling state or scrolled within the recent window.
    pub scrolling: bool,
    /// Reading or selecting.
    pub reading: bool,
    pub selecting: bool,
    pub clicked_elsewhere: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub proximity_factor: f64,
    pub proximity: f64,
    pub trajectory: f64,
    pub alignment: f64,
    pub dwell: f64,
    pub speed: f64,
    pub penalties: f64,
    /// Sum of all components; unbounded, may be negative.
    pub raw: f64,
}

pub fn score_pointer_sample(i: &ScoreInputs, t: &Tuning) -> ScoreBreakdown {
    let w = &t.weights;
    let p = &t.penalties;

    let normalized = if i.viewport_diagonal > 0.0 {
        (i.distance_to_target / i.viewport_diagonal).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let proximity_factor = 1.0 / (1.0 + normalized * w.proximity_falloff);
    let proximity = proximity_factor * w.proximity;

    let trajectory = if i.intersects {
        w.trajectory_hit
    } else if i.approaching && i.distance_to_target > 0.0 {
        let gain = (i.distance_to_target - i.projected_distance) / i.distance_to_target;
        (gain * w.approach).max(0.0)
    } else {
        0.0
    };

    let alignment = if i.alignment > 0.0 {
        i.alignment * w.alignment_reward
    } else if i.alignment < 0.0 {
        -i.alignment.abs() * w.alignment_penalty
    } else {
        0.0
    };

    let dwell = if i.dwelling {
        dwell_factor(i.dwell_duration_ms, w.dwell_saturation_secs) * w.dwell
    } else {
        0.0
    };

    let speed = if i.speed < w.slow_speed {
        w.slow_bonus * proximity_factor
    } else if i.speed >= w.fast_speed {
        -(i.speed / w.fast_penalty_divisor).min(w.fast_penalty_max)
    } else {
        0.0
    };

    let mut penalties = 0.0;
    if i.scrolling {
        penalties += p.scroll;
    }
    if i.reading {
        penalties += p.reading;
    }
    if i.selecting {
        penalties += p.selection;
    }
    if i.clicked_elsewhere {
        penalties += p.click_elsewhere;
    }

    let raw = proximity + trajectory + alignment + dwell + speed - penalties;
    ScoreBreakdown {
        proximity_factor,
        proximity,
        trajectory,
        alignment,
        dwell,
        speed,
        penalties,
        raw,
    }
}

/// Log-saturating dwell factor in [0, 1]; reaches 1 at `saturation_secs`.
pub fn dwell_factor(duration_ms: u64, saturation_secs: f64) -> f64 {
    let secs = duration_ms as f64 / 1000.0;
    ((1.0 + secs).log10() / (1.0 + saturation_secs).log10()).min(1.0)
}

/// Smooth a raw sample score against the stored one and clamp to [0, 100].
pub fn blend(raw: f64, old: f64, b: &Blend) -> f64 {
    let decay = b.min_decay.max(1.0 - raw / 100.0);
    let old_weight = (old / 100.0).clamp(0.0, b.max_old_weight);
    let blended = raw * (1.0 - old_weight) + old * old_weight;
    (blended - decay).clamp(0.0, 100.0)
}
