//! Pixel-space geometry used by trajectory projection.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        distance(self, other)
    }

    /// Linear extrapolation: where this point ends up after `secs` at `velocity`.
    pub fn offset(self, velocity: Vector, secs: f64) -> Point {
        Point::new(self.x + velocity.x * secs, self.y + velocity.y * secs)
    }

    pub fn vector_to(self, other: Point) -> Vector {
        Vector::new(other.x - self.x, other.y - self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector, or `None` for a zero-length vector.
    pub fn normalized(self) -> Option<Vector> {
        let len = self.length();
        if len > 0.0 && len.is_finite() {
            Some(Vector::new(self.x / len, self.y / len))
        } else {
            None
        }
    }
}

/// Axis-aligned rectangle given by its edges (screen coordinates, y grows down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            left: x,
            top: y,
            right: x + width,
            bottom: y + height,
        }
    }

    pub fn expanded(self, margin: f64) -> Rect {
        Rect {
            left: self.left - margin,
            top: self.top - margin,
            right: self.right + margin,
            bottom: self.bottom + margin,
        }
    }
}

pub fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Inclusive on all four edges.
pub fn point_in_rect(p: Point, r: Rect) -> bool {
    p.x >= r.left && p.x <= r.right && p.y >= r.top && p.y <= r.bottom
}

/// Parametric segment intersection. Parallel (and degenerate) segments never intersect.
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = a1.vector_to(a2);
    let d2 = b1.vector_to(b2);

    let det = d1.x * d2.y - d1.y * d2.x;
    if det == 0.0 {
        return false;
    }

    let ox = a1.x - b1.x;
    let oy = a1.y - b1.y;
    let s = (d1.x * oy - d1.y * ox) / det;
    let t = (d2.x * oy - d2.y * ox) / det;

    (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t)
}

pub fn segment_intersects_rect(a: Point, b: Point, r: Rect) -> bool {
    if point_in_rect(a, r) || point_in_rect(b, r) {
        return true;
    }

    let tl = Point::new(r.left, r.top);
    let tr = Point::new(r.right, r.top);
    let br = Point::new(r.right, r.bottom);
    let bl = Point::new(r.left, r.bottom);

    [(tl, tr), (tr, br), (bl, br), (tl, bl)]
        .into_iter()
        .any(|(e1, e2)| segments_intersect(a, b, e1, e2))
}
