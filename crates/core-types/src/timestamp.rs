use crate::error::CoreError;
use chrono::{DateTime, Utc};

/// Smallest accepted raw value. Anything below is before 2001-09-09 in seconds.
pub const MIN_SECONDS: f64 = 1e9;

/// Exclusive upper bound of the nanosecond band.
pub const MAX_RAW: f64 = 1e21;

/// A timestamp exactly as it was read from a store, precision unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawTimestamp {
    Int(i64),
    Float(f64),
}

impl From<i64> for RawTimestamp {
    fn from(value: i64) -> Self {
        RawTimestamp::Int(value)
    }
}

impl From<f64> for RawTimestamp {
    fn from(value: f64) -> Self {
        RawTimestamp::Float(value)
    }
}

impl RawTimestamp {
    fn as_f64(self) -> f64 {
        match self {
            RawTimestamp::Int(v) => v as f64,
            RawTimestamp::Float(v) => v,
        }
    }
}

/// The precision band a raw timestamp was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampUnit {
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimestampUnit {
    /// Classifies a raw value by decade thresholds.
    pub fn classify(raw: impl Into<RawTimestamp>) -> Result<Self, CoreError> {
        let value = raw.into().as_f64();
        if !value.is_finite() || !(MIN_SECONDS..MAX_RAW).contains(&value) {
            return Err(CoreError::UnrecognizedTimestampMagnitude(value));
        }

        let unit = if value >= 1e18 {
            TimestampUnit::Nanoseconds
        } else if value >= 1e15 {
            TimestampUnit::Microseconds
        } else if value >= 1e12 {
            TimestampUnit::Milliseconds
        } else {
            TimestampUnit::Seconds
        };
        Ok(unit)
    }

    /// Number of raw units per second.
    pub fn scale(&self) -> i64 {
        match self {
            TimestampUnit::Seconds => 1,
            TimestampUnit::Milliseconds => 1_000,
            TimestampUnit::Microseconds => 1_000_000,
            TimestampUnit::Nanoseconds => 1_000_000_000,
        }
    }
}

/// Converts a timestamp of unknown precision into seconds since the epoch.
///
/// Already-normalized values in the seconds band come back unchanged, so the
/// function can be applied twice without harm.
pub fn normalize(raw: impl Into<RawTimestamp>) -> Result<f64, CoreError> {
    let raw = raw.into();
    let unit = TimestampUnit::classify(raw)?;
    let scale = unit.scale();

    let seconds = match raw {
        // Split into quotient and remainder so large nanosecond values keep
        // their sub-second part.
        RawTimestamp::Int(v) => (v / scale) as f64 + (v % scale) as f64 / scale as f64,
        RawTimestamp::Float(v) => v / scale as f64,
    };
    Ok(seconds)
}

/// Converts normalized seconds into a UTC datetime for display.
pub fn to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999))
}
