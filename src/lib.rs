//! Cursor-trajectory intent scoring.
//!
//! The [`IntentTracker`] turns a stream of pointer, scroll and click samples
//! into a continuously updated 0–100 score for "the user is about to interact
//! with this element", suitable for anticipatory UI such as pre-highlighting
//! a button before it is hovered.

pub mod activity;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod intent;
pub mod replay;
pub mod scoring;
pub mod target;
pub mod tracker;

pub use activity::{ScrollDirection, UserState};
pub use config::{Profile, Tuning};
pub use error::IntentError;
pub use geometry::Point;
pub use intent::{DebugSnapshot, IntentTracker, StaticSurface, SubscriptionId, Surface};
pub use target::{TargetRect, Viewport};
