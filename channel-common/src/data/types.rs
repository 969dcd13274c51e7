// channel-common/src/data/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::time::deserialize_millis;

// =================================================================
// Errors
// =================================================================

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Decode(err.to_string())
    }
}

pub type DataResult<T> = Result<T, DataError>;

// =================================================================
// Candles
// =================================================================

/// OHLCV candle. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(deserialize_with = "deserialize_millis")]
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Candle whose four prices are all `price`.
    pub fn flat(timestamp: i64, price: f64) -> Self {
        Self::new(timestamp, price, price, price, price, 0.0)
    }
}

// =================================================================
// Pivots
// =================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    Peak,
    Trough,
}

impl PivotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PivotKind::Peak => "peak",
            PivotKind::Trough => "trough",
        }
    }
}

impl fmt::Display for PivotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pivot as reported by the turning-point detector, before an id is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotInput {
    #[serde(deserialize_with = "deserialize_millis")]
    pub timestamp: i64,
    pub price: f64,
    #[serde(rename = "type")]
    pub kind: PivotKind,
}

impl PivotInput {
    pub fn peak(timestamp: i64, price: f64) -> Self {
        Self {
            timestamp,
            price,
            kind: PivotKind::Peak,
        }
    }

    pub fn trough(timestamp: i64, price: f64) -> Self {
        Self {
            timestamp,
            price,
            kind: PivotKind::Trough,
        }
    }
}

/// A stored pivot. Ids are unique within one detector until it is reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub id: u64,
    pub timestamp: i64,
    pub price: f64,
    #[serde(rename = "type")]
    pub kind: PivotKind,
}

impl Pivot {
    pub fn from_input(id: u64, input: &PivotInput) -> Self {
        Self {
            id,
            timestamp: input.timestamp,
            price: input.price,
            kind: input.kind,
        }
    }
}

// =================================================================
// Upstream record
// =================================================================

/// One output of the turning-point detector: always a candle, sometimes a pivot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotRecord {
    #[serde(default)]
    pub candle: Option<Candle>,
    #[serde(default)]
    pub pivot: Option<PivotInput>,
}

impl PivotRecord {
    pub fn candle_only(candle: Candle) -> Self {
        Self {
            candle: Some(candle),
            pivot: None,
        }
    }

    pub fn with_pivot(candle: Candle, pivot: PivotInput) -> Self {
        Self {
            candle: Some(candle),
            pivot: Some(pivot),
        }
    }

    pub fn from_json_line(line: &str) -> DataResult<Self> {
        Ok(serde_json::from_str(line)?)
    }
}
