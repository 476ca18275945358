// error.rs — Error types for the tick clock.

use thiserror::Error;

use crate::clock::Tick;

/// Errors that can occur while advancing the clock or converting time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// The tick duration must be strictly positive.
    #[error("invalid tick duration: {0}")]
    InvalidTickDuration(String),

    /// Ticks never move backward.
    #[error("cannot move clock backward from tick {current} to tick {requested}")]
    Backward { current: Tick, requested: Tick },

    /// A conversion fell outside the representable tick or calendar range.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Text could not be parsed as a calendar date.
    #[error("invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },

    /// Text could not be parsed as a duration.
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },
}
