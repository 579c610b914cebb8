//! Conversion between `mm:ss` / `hh:mm:ss` display strings and seconds.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimecodeError {
    #[error("empty timecode")]
    Empty,

    #[error("expected mm:ss or hh:mm:ss, got {input:?}")]
    WrongArity { input: String },

    #[error("{part:?} in {input:?} is not a non-negative number")]
    NotNumeric { input: String, part: String },

    #[error("{input:?} is past the longest supported video")]
    OutOfRange { input: String },
}

/// Longest position a timecode may name: 100 hours.
pub const MAX_SECONDS: f64 = 100.0 * 3600.0;

/// Parse a display timecode into seconds.
///
/// Two parts are read as `(minutes, seconds)`, three as
/// `(hours, minutes, seconds)`. Every part must be a non-negative number;
/// fractional values are accepted.
pub fn parse(display: &str) -> Result<f64, TimecodeError> {
    let display = display.trim();
    if display.is_empty() {
        return Err(TimecodeError::Empty);
    }

    let parts = display
        .split(':')
        .map(|part| parse_part(display, part))
        .collect::<Result<Vec<_>, _>>()?;

    let seconds = match parts.as_slice() {
        [minutes, seconds] => minutes * 60.0 + seconds,
        [hours, minutes, seconds] => hours * 3600.0 + minutes * 60.0 + seconds,
        _ => {
            return Err(TimecodeError::WrongArity {
                input: display.to_string(),
            });
        }
    };
    if !seconds.is_finite() || seconds > MAX_SECONDS {
        return Err(TimecodeError::OutOfRange {
            input: display.to_string(),
        });
    }
    Ok(seconds)
}

fn parse_part(input: &str, part: &str) -> Result<f64, TimecodeError> {
    let part = part.trim();
    let not_numeric = || TimecodeError::NotNumeric {
        input: input.to_string(),
        part: part.to_string(),
    };

    // f64::from_str accepts "inf" and "NaN", which are never valid here
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(not_numeric());
    }

    let value: f64 = part.parse().map_err(|_| not_numeric())?;
    if !value.is_finite() || value < 0.0 {
        return Err(not_numeric());
    }
    Ok(value)
}

/// Format seconds as `m:ss`. Minutes are not padded, sub-second precision is dropped.
pub fn format(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
