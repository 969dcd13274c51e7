// channel-common/src/data/time.rs
// Normalisierung heterogener Zeitstempel auf Epoch-Millisekunden

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::types::{DataError, DataResult};

/// Naive datetime layouts accepted for textual timestamps, interpreted as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A timestamp as it arrives from an upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Timestamp::Millis(value)
    }
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        Timestamp::Text(value.to_string())
    }
}

pub struct TimeConverter;

impl TimeConverter {
    /// Converts a timestamp to integer epoch milliseconds.
    pub fn to_millis(ts: &Timestamp) -> DataResult<i64> {
        match ts {
            Timestamp::Millis(ms) => Ok(*ms),
            Timestamp::Float(value) => {
                let millis = value.trunc();
                // i64::MAX as f64 is 2^63, one past the range
                if !millis.is_finite() || millis < i64::MIN as f64 || millis >= i64::MAX as f64 {
                    return Err(DataError::InvalidTimestamp(value.to_string()));
                }
                Ok(millis as i64)
            }
            Timestamp::Text(text) => Self::parse_text(text),
        }
    }

    /// Permissive variant: anything that cannot be converted becomes epoch zero.
    pub fn to_millis_or_zero(ts: &Timestamp) -> i64 {
        match Self::to_millis(ts) {
            Ok(ms) => ms,
            Err(e) => {
                warn!("Timestamp fallback to epoch zero: {}", e);
                0
            }
        }
    }

    fn parse_text(text: &str) -> DataResult<i64> {
        let trimmed = text.trim();

        if let Ok(ms) = trimmed.parse::<i64>() {
            return Ok(ms);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.timestamp_millis());
        }

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(naive.and_utc().timestamp_millis());
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc().timestamp_millis());
            }
        }

        Err(DataError::InvalidTimestamp(text.to_string()))
    }
}

/// Serde adapter: accepts any [`Timestamp`] form and yields epoch millis.
pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Timestamp::deserialize(deserializer)?;
    TimeConverter::to_millis(&raw).map_err(serde::de::Error::custom)
}
