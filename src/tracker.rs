//! Rolling pointer history and velocity estimation.

use std::collections::VecDeque;

use serde::Serialize;

use crate::geometry::{Point, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSample {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
}

impl PositionSample {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Cursor kinematics after the latest sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Motion {
    pub position: Point,
    pub previous: Point,
    pub velocity: Vector,
    /// px/s
    pub speed: f64,
}

impl Motion {
    /// Distance covered since the previous sample.
    pub fn step(&self) -> f64 {
        self.previous.distance_to(self.position)
    }
}

#[derive(Debug)]
pub struct PointerWindow {
    samples: VecDeque<PositionSample>,
    capacity: usize,
    motion: Motion,
}

impl PointerWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            motion: Motion::default(),
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(2);
        self.evict();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    /// Record a sample and re-estimate velocity from the oldest retained one.
    ///
    /// When the retained window spans no time the previous velocity is kept.
    pub fn on_sample(&mut self, p: Point, timestamp_ms: u64) -> Motion {
        self.motion.previous = self.motion.position;
        self.motion.position = p;

        self.samples.push_back(PositionSample {
            x: p.x,
            y: p.y,
            timestamp_ms,
        });
        self.evict();

        if self.samples.len() >= 2 {
            if let Some(oldest) = self.samples.front() {
                let elapsed = timestamp_ms.saturating_sub(oldest.timestamp_ms) as f64 / 1000.0;
                if elapsed > 0.0 {
                    let v = oldest.point().vector_to(p);
                    self.motion.velocity = Vector::new(v.x / elapsed, v.y / elapsed);
                    self.motion.speed = self.motion.velocity.length();
                }
            }
        }

        self.motion
    }

    fn evict(&mut self) {
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }
}
