//! # Temporal Types
//!
//! The two literal parsers usage policies need, both normalising to UTC:
//! date-time right operands (`xsd:dateTimeStamp`) and duration right
//! operands (`xsd:duration`).
//!
//! Durations follow the ISO 8601 time-based form `[-]PnDTnHnMn.nS`. Calendar
//! units (years, months, weeks) have no fixed length and are rejected rather
//! than approximated.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::error::TemporalError;

/// Parse a date-time right operand into UTC.
///
/// Accepts RFC 3339 with any offset (normalised to UTC). A value without an
/// offset is read as UTC.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, TemporalError> {
    let trimmed = value.trim();
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| TemporalError::InvalidDate {
                value: value.to_string(),
                reason: rfc_err.to_string(),
            }),
    }
}

/// Parse an ISO 8601 `[-]PnDTnHnMn.nS` duration.
///
/// Each component may carry its own sign, as in `PT-6H3M`. Fractional
/// digits are only allowed on seconds and are truncated to milliseconds.
pub fn parse_duration(value: &str) -> Result<TimeDelta, TemporalError> {
    let err = |reason: &str| TemporalError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let s = value.trim();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let rest = rest
        .strip_prefix(['P', 'p'])
        .ok_or_else(|| err("missing 'P' designator"))?;
    if rest.is_empty() {
        return Err(err("no duration components"));
    }

    let (date_part, time_part) = match rest.find(['T', 't']) {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };

    let mut total_ms: i64 = 0;

    if !date_part.is_empty() {
        let days = date_part
            .strip_suffix(['D', 'd'])
            .ok_or_else(|| err("only day units are supported before 'T'"))?;
        let days: i64 = days.parse().map_err(|_| err("invalid day count"))?;
        total_ms = days
            .checked_mul(86_400_000)
            .ok_or_else(|| err("duration overflow"))?;
    }

    if let Some(time) = time_part {
        if time.is_empty() {
            return Err(err("empty time section"));
        }
        let mut number = String::new();
        let mut last_rank = 0u8;
        for c in time.chars() {
            match c {
                '0'..='9' | '.' | '-' | '+' => number.push(c),
                'H' | 'h' | 'M' | 'm' | 'S' | 's' => {
                    let rank = match c.to_ascii_uppercase() {
                        'H' => 1,
                        'M' => 2,
                        _ => 3,
                    };
                    if number.is_empty() {
                        return Err(err("unit without a value"));
                    }
                    if rank <= last_rank {
                        return Err(err("time units out of order"));
                    }
                    last_rank = rank;
                    let component_ms = match rank {
                        1 => whole(&number)?.checked_mul(3_600_000),
                        2 => whole(&number)?.checked_mul(60_000),
                        _ => seconds_to_millis(&number).map_err(|_| err("invalid seconds"))?,
                    }
                    .ok_or_else(|| err("duration overflow"))?;
                    total_ms = total_ms
                        .checked_add(component_ms)
                        .ok_or_else(|| err("duration overflow"))?;
                    number.clear();
                }
                _ => return Err(err("unexpected character")),
            }
        }
        if !number.is_empty() {
            return Err(err("trailing value without a unit"));
        }
    }

    if negative {
        total_ms = total_ms
            .checked_neg()
            .ok_or_else(|| err("duration overflow"))?;
    }

    TimeDelta::try_milliseconds(total_ms).ok_or_else(|| err("duration out of range"))
}

fn whole(number: &str) -> Result<i64, TemporalError> {
    number.parse().map_err(|_| TemporalError::InvalidDuration {
        value: number.to_string(),
        reason: "fractions are only allowed on seconds".to_string(),
    })
}

fn seconds_to_millis(number: &str) -> Result<Option<i64>, std::num::ParseIntError> {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    let negative = int_part.starts_with('-');
    let secs: i64 = if int_part == "-" || int_part.is_empty() {
        0
    } else {
        int_part.parse()?
    };
    let mut frac = frac_part.chars().take(3).collect::<String>();
    while frac.len() < 3 {
        frac.push('0');
    }
    let millis: i64 = frac.parse()?;
    let signed_millis = if negative { -millis } else { millis };
    Ok(secs
        .checked_mul(1_000)
        .and_then(|ms| ms.checked_add(signed_millis)))
}
