// format.rs — Text formats for calendar dates and durations.
//
// Dates: RFC 3339 ("2024-03-01T12:00:00Z") or a naive UTC timestamp
// ("2024-03-01 12:00:00.5"). Durations: "[-]H+:MM:SS[.fffffffff]" or a plain
// decimal number of seconds ("90", "1.25").
//
// Everything is kept in integer nanoseconds so that formatting a value and
// parsing it back is exact.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta, Utc};

use crate::error::ClockError;

pub(crate) const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Naive layouts accepted after RFC 3339 fails. `%.f` also matches an absent fraction.
/// `%Y` takes a signed year of any width, which covers the "+10000-01-01T00:00:00Z"
/// form `format_date` writes outside years 0000-9999.
const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a calendar date, interpreting naive timestamps as UTC.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, ClockError> {
    let text = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Ok(date.with_timezone(&Utc));
    }
    let naive_text = text
        .strip_suffix('Z')
        .or_else(|| text.strip_suffix('z'))
        .unwrap_or(text);
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_text, layout) {
            return Ok(naive.and_utc());
        }
    }
    Err(ClockError::InvalidDate {
        input: input.to_string(),
        reason: "expected RFC 3339 or 'YYYY-MM-DD HH:MM:SS'".to_string(),
    })
}

/// Render a date as RFC 3339 in UTC with as many fractional digits as needed.
pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a duration in `H:MM:SS[.f]` form or as plain seconds.
pub fn parse_duration(input: &str) -> Result<TimeDelta, ClockError> {
    let invalid = |reason: &str| ClockError::InvalidDuration {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let text = input.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if body.is_empty() {
        return Err(invalid("empty duration"));
    }

    let nanos = if body.contains(':') {
        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() != 3 {
            return Err(invalid("expected HH:MM:SS"));
        }
        let hours = parse_digits(parts[0]).ok_or_else(|| invalid("hours must be digits"))?;
        let minutes = parse_digits(parts[1]).ok_or_else(|| invalid("minutes must be digits"))?;
        if minutes >= 60 {
            return Err(invalid("minutes must be below 60"));
        }
        let (secs, frac) = split_seconds(parts[2]).ok_or_else(|| invalid("malformed seconds"))?;
        if secs >= 60 {
            return Err(invalid("seconds must be below 60"));
        }
        ((hours * 60 + minutes) * 60 + secs) * NANOS_PER_SEC + frac
    } else {
        let (secs, frac) =
            split_seconds(body).ok_or_else(|| invalid("expected seconds or HH:MM:SS"))?;
        secs * NANOS_PER_SEC + frac
    };

    let nanos = if negative { -nanos } else { nanos };
    delta_from_nanos(nanos).ok_or_else(|| invalid("duration out of range"))
}

/// Render a duration as `[-]HH:MM:SS[.f]`, trimming trailing zeros of the fraction.
pub fn format_duration(delta: TimeDelta) -> String {
    let nanos = delta_nanos(delta);
    let sign = if nanos < 0 { "-" } else { "" };
    let abs = nanos.abs();
    let total_secs = abs / NANOS_PER_SEC;
    let frac = abs % NANOS_PER_SEC;

    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let secs = total_secs % 60;

    let mut out = format!("{sign}{hours:02}:{minutes:02}:{secs:02}");
    if frac != 0 {
        let digits = format!("{frac:09}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// Total nanoseconds of a delta. `subsec_nanos` carries the sign of the delta.
pub(crate) fn delta_nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * NANOS_PER_SEC + i128::from(delta.subsec_nanos())
}

/// Inverse of [`delta_nanos`]; `None` when the value exceeds chrono's range.
pub(crate) fn delta_from_nanos(nanos: i128) -> Option<TimeDelta> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let rem = i64::try_from(nanos.rem_euclid(NANOS_PER_SEC)).ok()?;
    TimeDelta::try_seconds(secs)?.checked_add(&TimeDelta::nanoseconds(rem))
}

fn parse_digits(text: &str) -> Option<i128> {
    if text.is_empty() || text.len() > 18 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Split `SS[.fffffffff]` into whole seconds and nanoseconds.
fn split_seconds(text: &str) -> Option<(i128, i128)> {
    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (text, None),
    };
    let secs = parse_digits(whole)?;
    let nanos = match frac {
        None => 0,
        Some(frac) => {
            if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let value: i128 = frac.parse().ok()?;
            value * 10i128.pow(9 - frac.len() as u32)
        }
    };
    Some((secs, nanos))
}
