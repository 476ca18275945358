//! # tg-clock
//!
//! The process-wide notion of discrete time for a tickgraph.
//!
//! A [`Tick`] is an integer counter that never moves backward. The
//! [`TickClock`] maps ticks onto calendar time through a fixed epoch and a
//! fixed tick duration, so that goal attributes expressed as dates or
//! durations can be turned into tick intervals and back.
//!
//! ## Rounding
//!
//! Conversions into ticks take an explicit [`Rounding`]. Lower bounds use
//! [`Rounding::Floor`] and upper bounds use [`Rounding::Ceil`], which keeps
//! an interval at least as wide as the calendar range it came from.
//!
//! ```rust
//! use chrono::TimeDelta;
//! use tg_clock::{Rounding, TickClock};
//!
//! let clock = TickClock::new(TimeDelta::seconds(2)).unwrap();
//! let five_secs = TimeDelta::seconds(5);
//! assert_eq!(clock.duration_to_ticks(five_secs, Rounding::Floor).unwrap(), 2);
//! assert_eq!(clock.duration_to_ticks(five_secs, Rounding::Ceil).unwrap(), 3);
//! ```

pub mod clock;
pub mod error;
pub mod format;

pub use clock::{Rounding, Tick, TickClock};
pub use error::ClockError;
pub use format::{format_date, format_duration, parse_date, parse_duration};
