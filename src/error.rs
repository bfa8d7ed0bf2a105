//! Error types for the intent tracker.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntentError {
    /// A coordinate, size or timestamp was NaN, infinite or out of range.
    #[error("invalid input: {field} = {value}")]
    InvalidInput { field: &'static str, value: f64 },

    /// The tracker was disposed and no longer accepts events.
    #[error("tracker has been disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, IntentError>;

/// Reject non-finite numbers before they reach the history or the score.
pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(IntentError::InvalidInput { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64> {
    let v = finite(field, value)?;
    if v < 0.0 {
        return Err(IntentError::InvalidInput { field, value });
    }
    Ok(v)
}
