pub mod time;
pub mod types;

pub use time::{TimeConverter, Timestamp};
pub use types::{
    Candle, DataError, DataResult, Pivot, PivotInput, PivotKind, PivotRecord,
};
