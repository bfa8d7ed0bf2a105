//! Watched element geometry and the viewport it lives in.

use serde::{Deserialize, Serialize};

use crate::error::{IntentError, Result, finite, non_negative};
use crate::geometry::{Point, Rect};

/// Bounding box of the watched element plus the point the cursor is aiming at.
///
/// The centre normally sits in the middle of the box, but callers may move it
/// when the visual centre of the element differs from its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl TargetRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            center_x: x + width / 2.0,
            center_y: y + height / 2.0,
        }
    }

    pub fn with_center(mut self, center_x: f64, center_y: f64) -> Self {
        self.center_x = center_x;
        self.center_y = center_y;
        self
    }

    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.x, self.y, self.width, self.height)
    }

    /// Distance from the centre under which the cursor counts as dwelling.
    pub fn dwell_threshold(&self, factor: f64) -> f64 {
        self.width.max(self.height) * factor
    }

    pub fn validate(&self) -> Result<()> {
        finite("target.x", self.x)?;
        finite("target.y", self.y)?;
        non_negative("target.width", self.width)?;
        non_negative("target.height", self.height)?;
        finite("target.center_x", self.center_x)?;
        finite("target.center_y", self.center_y)?;
        Ok(())
    }
}

impl Default for TargetRect {
    fn default() -> Self {
        Self::new(20.0, 20.0, 120.0, 40.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }

    /// A viewport must have a positive, finite area so distances can be normalized.
    pub fn validate(&self) -> Result<()> {
        for (field, v) in [("viewport.width", self.width), ("viewport.height", self.height)] {
            if finite(field, v)? <= 0.0 {
                return Err(IntentError::InvalidInput { field, value: v });
            }
        }
        Ok(())
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}
