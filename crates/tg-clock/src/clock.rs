// clock.rs — TickClock: the graph's discrete time and its calendar mapping.
//
// Before the graph starts ticking, the clock only carries a provisional tick
// (`advance(v, false)`). Once a tick is committed (`advance(v, true)`) the
// committed value is authoritative; the cached current tick is marked stale
// and refreshed from it on the next read.
//
// Conversions use a fixed epoch (calendar time of tick 0) and a fixed tick
// duration, with integer nanosecond arithmetic throughout.

use std::cell::Cell;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ClockError;
use crate::format::{
    delta_from_nanos, delta_nanos, format_date, format_duration, parse_date, parse_duration,
};

/// A discrete time step. All timestamped graph state is indexed by tick.
pub type Tick = i64;

/// Direction used when a calendar value falls between two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round toward negative infinity (lower bounds).
    Floor,
    /// Round toward positive infinity (upper bounds).
    Ceil,
}

/// The tick clock owned by a graph.
#[derive(Debug, Clone)]
pub struct TickClock {
    epoch: DateTime<Utc>,
    tick_duration: TimeDelta,
    tick_nanos: i128,
    /// Cached current tick: the provisional value, or the last committed one once refreshed.
    current: Cell<Tick>,
    committed: Option<Tick>,
    stale: Cell<bool>,
}

impl TickClock {
    /// Create a clock with the given tick length, anchored at the Unix epoch, at tick 0.
    pub fn new(tick_duration: TimeDelta) -> Result<Self, ClockError> {
        let tick_nanos = delta_nanos(tick_duration);
        if tick_nanos <= 0 {
            return Err(ClockError::InvalidTickDuration(format_duration(
                tick_duration,
            )));
        }
        Ok(Self {
            epoch: DateTime::<Utc>::UNIX_EPOCH,
            tick_duration,
            tick_nanos,
            current: Cell::new(0),
            committed: None,
            stale: Cell::new(false),
        })
    }

    /// Set the calendar time of tick 0 and return self.
    pub fn with_epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = epoch;
        self
    }

    /// Set the initial provisional tick and return self.
    pub fn starting_at(self, tick: Tick) -> Self {
        self.current.set(tick);
        self
    }

    /// Calendar time of tick 0.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Real-time length of one tick.
    pub fn tick_duration(&self) -> TimeDelta {
        self.tick_duration
    }

    /// Whether a tick has ever been committed.
    pub fn has_tick(&self) -> bool {
        self.committed.is_some()
    }

    /// The latest committed tick, or the provisional tick before the first commit.
    pub fn current_tick(&self) -> Tick {
        if self.stale.replace(false) {
            if let Some(committed) = self.committed {
                self.current.set(committed);
            }
        }
        self.current.get()
    }

    /// Move the clock to `value`, either provisionally or as the authoritative time.
    pub fn advance(&mut self, value: Tick, committed: bool) -> Result<(), ClockError> {
        let current = self.current_tick();
        if value < current {
            return Err(ClockError::Backward {
                current,
                requested: value,
            });
        }
        if committed {
            self.committed = Some(value);
            self.stale.set(true);
        } else {
            self.current.set(value);
        }
        tracing::trace!(tick = value, committed, "clock advanced");
        Ok(())
    }

    /// Convert a calendar time into a tick.
    pub fn time_to_tick(&self, date: DateTime<Utc>, rounding: Rounding) -> Result<Tick, ClockError> {
        let offset = delta_nanos(date.signed_duration_since(self.epoch));
        self.nanos_to_ticks(offset, rounding)
    }

    /// Calendar time at the start of `tick`.
    pub fn tick_to_time(&self, tick: Tick) -> Result<DateTime<Utc>, ClockError> {
        let offset = self.ticks_to_duration(tick)?;
        self.epoch
            .checked_add_signed(offset)
            .ok_or_else(|| ClockError::OutOfRange(format!("tick {tick} is not a valid date")))
    }

    /// Convert a real-time duration into a number of ticks.
    pub fn duration_to_ticks(&self, delta: TimeDelta, rounding: Rounding) -> Result<Tick, ClockError> {
        self.nanos_to_ticks(delta_nanos(delta), rounding)
    }

    /// Real-time length of `ticks` ticks.
    pub fn ticks_to_duration(&self, ticks: Tick) -> Result<TimeDelta, ClockError> {
        delta_from_nanos(i128::from(ticks) * self.tick_nanos).ok_or_else(|| {
            ClockError::OutOfRange(format!("{ticks} ticks exceed the duration range"))
        })
    }

    /// Parse a date and convert it to a tick (floor).
    pub fn as_date(&self, text: &str) -> Result<Tick, ClockError> {
        self.time_to_tick(parse_date(text)?, Rounding::Floor)
    }

    /// Parse a duration and convert it to ticks, rounding up when `round_up` is set.
    pub fn as_duration(&self, text: &str, round_up: bool) -> Result<Tick, ClockError> {
        let rounding = if round_up {
            Rounding::Ceil
        } else {
            Rounding::Floor
        };
        self.duration_to_ticks(parse_duration(text)?, rounding)
    }

    /// Render a tick as a calendar date.
    pub fn date_str(&self, tick: Tick) -> Result<String, ClockError> {
        Ok(format_date(self.tick_to_time(tick)?))
    }

    /// Render a tick count as a duration.
    pub fn duration_str(&self, ticks: Tick) -> Result<String, ClockError> {
        Ok(format_duration(self.ticks_to_duration(ticks)?))
    }

    fn nanos_to_ticks(&self, nanos: i128, rounding: Rounding) -> Result<Tick, ClockError> {
        let floor = nanos.div_euclid(self.tick_nanos);
        let ticks = match rounding {
            Rounding::Floor => floor,
            Rounding::Ceil if nanos.rem_euclid(self.tick_nanos) == 0 => floor,
            Rounding::Ceil => floor + 1,
        };
        Tick::try_from(ticks)
            .map_err(|_| ClockError::OutOfRange(format!("{ticks} does not fit in a tick")))
    }
}
