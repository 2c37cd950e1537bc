//! Parsing and formatting of index and interval parameters.
//!
//! Indexes are carried as milliseconds since the Unix epoch (UTC), the same
//! representation `Value::Timestamp` uses.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    // Invariant-culture form sent by .NET clients
    "%m/%d/%Y %H:%M:%S",
];

/// Parse an index parameter. Offsets are honored; naive forms are UTC.
pub fn parse_time(input: &str) -> Result<i64, TimeParseError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }

    Err(TimeParseError::InvalidTimestamp(input.to_string()))
}

/// Format milliseconds since the epoch as RFC 3339 UTC
pub fn format_millis(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => ms.to_string(),
    }
}

/// Parse an interval into milliseconds.
///
/// Accepts `[d.]hh:mm:ss[.fff]`, ISO-8601 durations (`PT20M`, `P1DT2H`) and
/// humantime strings (`20m`, `1h 30m`).
pub fn parse_interval(input: &str) -> Result<i64, TimeParseError> {
    let trimmed = input.trim();
    let invalid = || TimeParseError::InvalidInterval(input.to_string());

    let ms = if trimmed.contains(':') {
        parse_timespan(trimmed).ok_or_else(invalid)?
    } else if trimmed.starts_with('P') || trimmed.starts_with('p') {
        parse_iso8601(trimmed).ok_or_else(invalid)?
    } else {
        let duration = humantime::parse_duration(trimmed).map_err(|_| invalid())?;
        i64::try_from(duration.as_millis()).map_err(|_| invalid())?
    };

    Ok(ms)
}

fn parse_timespan(s: &str) -> Option<i64> {
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let (days, hours) = match parts[0].split_once('.') {
        Some((d, h)) => (d.parse::<i64>().ok()?, h.parse::<i64>().ok()?),
        None => (0, parts[0].parse::<i64>().ok()?),
    };
    let minutes = parts[1].parse::<i64>().ok()?;
    let seconds = parts[2].parse::<f64>().ok()?;

    if hours >= 24 || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let ms = days
        .checked_mul(24)?
        .checked_add(hours)?
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60_000)?
        .checked_add((seconds * 1000.0).round() as i64)?;
    Some(if negative { -ms } else { ms })
}

fn parse_iso8601(s: &str) -> Option<i64> {
    let body = &s[1..];
    let (date_part, time_part) = match body.split_once(['T', 't']) {
        Some((d, t)) => (d, Some(t)),
        None => (body, None),
    };

    let mut total = 0.0_f64;
    let mut seen = false;

    for (number, unit) in iso_components(date_part)? {
        let factor = match unit {
            'W' => 7.0 * 86_400_000.0,
            'D' => 86_400_000.0,
            _ => return None,
        };
        total += number * factor;
        seen = true;
    }

    if let Some(time_part) = time_part {
        let components = iso_components(time_part)?;
        if components.is_empty() {
            return None;
        }
        for (number, unit) in components {
            let factor = match unit {
                'H' => 3_600_000.0,
                'M' => 60_000.0,
                'S' => 1000.0,
                _ => return None,
            };
            total += number * factor;
            seen = true;
        }
    }

    if !seen || !total.is_finite() || total >= i64::MAX as f64 {
        return None;
    }
    Some(total.round() as i64)
}

/// Split `1H30M` into `[(1.0, 'H'), (30.0, 'M')]`
fn iso_components(s: &str) -> Option<Vec<(f64, char)>> {
    let mut out = Vec::new();
    let mut number = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
        } else {
            if number.is_empty() {
                return None;
            }
            out.push((number.parse::<f64>().ok()?, c.to_ascii_uppercase()));
            number.clear();
        }
    }

    if !number.is_empty() {
        return None;
    }
    Some(out)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Invalid interval '{0}'")]
    InvalidInterval(String),
}
