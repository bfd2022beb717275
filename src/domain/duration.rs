use thiserror::Error;
use time::Duration;

const NANOS_PER_MICRO: i128 = 1_000;
const NANOS_PER_MILLI: i128 = 1_000_000;
const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_MINUTE: i128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MINUTE;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DurationParseError {
    #[error("empty duration (expected something like 25m, 1h30m, 90s)")]
    Empty,

    #[error("invalid duration {0:?} (expected something like 25m, 1h30m, 90s)")]
    Invalid(String),

    #[error("missing unit in duration {0:?} (use h, m, s, ms)")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { input: String, unit: String },

    #[error("duration {0:?} is out of range")]
    OutOfRange(String),

    #[error("session length {0:?} must be greater than zero")]
    NotPositive(String),
}

/// Parses compact unit-suffixed durations: `25m`, `1h30m`, `1.5h`, `90s`,
/// `250ms`, `-5s`, or a bare `0`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let (negative, body) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if body == "0" {
        return Ok(Duration::ZERO);
    }
    if body.is_empty() {
        return Err(DurationParseError::Invalid(trimmed.to_string()));
    }

    let mut total: i128 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let number_len = rest
            .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(DurationParseError::Invalid(trimmed.to_string()));
        }
        let (number, after_number) = rest.split_at(number_len);

        let unit_len = after_number
            .find(|ch: char| ch.is_ascii_digit() || ch == '.')
            .unwrap_or(after_number.len());
        if unit_len == 0 {
            return Err(DurationParseError::MissingUnit(trimmed.to_string()));
        }
        let (unit, after_unit) = after_number.split_at(unit_len);

        let scale = unit_scale(unit).ok_or_else(|| DurationParseError::UnknownUnit {
            input: trimmed.to_string(),
            unit: unit.to_string(),
        })?;
        let nanos = scaled_nanos(number, scale)
            .ok_or_else(|| DurationParseError::Invalid(trimmed.to_string()))?;
        total = total
            .checked_add(nanos)
            .ok_or_else(|| DurationParseError::OutOfRange(trimmed.to_string()))?;

        rest = after_unit;
    }

    if negative {
        total = -total;
    }
    let nanos =
        i64::try_from(total).map_err(|_| DurationParseError::OutOfRange(trimmed.to_string()))?;
    Ok(Duration::nanoseconds(nanos))
}

/// A planned session length: any [`parse_duration`] input above zero.
pub fn parse_session_length(input: &str) -> Result<Duration, DurationParseError> {
    let duration = parse_duration(input)?;
    if duration <= Duration::ZERO {
        return Err(DurationParseError::NotPositive(input.trim().to_string()));
    }
    Ok(duration)
}

fn unit_scale(unit: &str) -> Option<i128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

fn scaled_nanos(number: &str, scale: i128) -> Option<i128> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.contains('.') {
        return None;
    }

    let whole_value: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole_value.checked_mul(scale)?;

    let mut place = scale;
    for digit in fraction.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        nanos = nanos.checked_add(i128::from(digit - b'0') * place)?;
    }
    Some(nanos)
}

/// Canonical compact form, the inverse of [`parse_duration`]: `1h0m0s`,
/// `25m0s`, `1m30s`, `1.5s`, `250ms`, `0s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.whole_nanoseconds();
    if total == 0 {
        return "0s".to_string();
    }

    let sign = if total < 0 { "-" } else { "" };
    let magnitude = total.unsigned_abs();

    if magnitude < NANOS_PER_SECOND as u128 {
        return if magnitude < NANOS_PER_MICRO as u128 {
            format!("{sign}{magnitude}ns")
        } else if magnitude < NANOS_PER_MILLI as u128 {
            format!(
                "{sign}{}µs",
                decimal(magnitude / NANOS_PER_MICRO as u128, magnitude % NANOS_PER_MICRO as u128, 3)
            )
        } else {
            format!(
                "{sign}{}ms",
                decimal(magnitude / NANOS_PER_MILLI as u128, magnitude % NANOS_PER_MILLI as u128, 6)
            )
        };
    }

    let hours = magnitude / NANOS_PER_HOUR as u128;
    let minutes = (magnitude % NANOS_PER_HOUR as u128) / NANOS_PER_MINUTE as u128;
    let seconds_nanos = magnitude % NANOS_PER_MINUTE as u128;
    let seconds = decimal(
        seconds_nanos / NANOS_PER_SECOND as u128,
        seconds_nanos % NANOS_PER_SECOND as u128,
        9,
    );

    let mut out = String::from(sign);
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

fn decimal(whole: u128, fraction: u128, digits: usize) -> String {
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{fraction:0digits$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}
