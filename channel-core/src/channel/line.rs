// channel-core/src/channel/line.rs
// Linienfabrik: Gerade durch zwei gleichartige Pivots (y = slope * t + intercept)

use channel_common::data::{Pivot, PivotKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Upper,
    Lower,
}

impl LineKind {
    pub fn for_pivot(kind: PivotKind) -> Self {
        match kind {
            PivotKind::Peak => LineKind::Upper,
            PivotKind::Trough => LineKind::Lower,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Upper => "upper",
            LineKind::Lower => "lower",
        }
    }
}

/// Order-independent key of the two endpoint pivot ids, smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(u64, u64);

impl PairKey {
    pub fn new(a: u64, b: u64) -> Self {
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }

    pub fn first(&self) -> u64 {
        self.0
    }

    pub fn second(&self) -> u64 {
        self.1
    }

    pub fn contains(&self, id: u64) -> bool {
        self.0 == id || self.1 == id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line_{}_{}", self.first(), self.second())
    }
}

/// Candidate channel boundary. Immutable once built; acceptance is recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: PairKey,
    pub point1: Pivot,
    pub point2: Pivot,
    pub slope: f64,
    pub intercept: f64,
    #[serde(rename = "type")]
    pub kind: LineKind,
}

impl Line {
    /// Line price at `timestamp` (epoch millis).
    pub fn price_at(&self, timestamp: i64) -> f64 {
        self.slope * timestamp as f64 + self.intercept
    }

    /// Earliest and latest endpoint timestamps.
    pub fn span(&self) -> (i64, i64) {
        let (a, b) = (self.point1.timestamp, self.point2.timestamp);
        (a.min(b), a.max(b))
    }

    pub fn touches(&self, pivot_id: u64) -> bool {
        self.id.contains(pivot_id)
    }
}

/// Builds the line through `p1` and `p2`.
///
/// Returns `None` for two pivots sharing a timestamp (a vertical line). The
/// caller is expected to pair only pivots of the same kind.
pub fn build_line(p1: &Pivot, p2: &Pivot) -> Option<Line> {
    if p1.timestamp == p2.timestamp {
        return None;
    }

    let (x1, y1) = (p1.timestamp as f64, p1.price);
    let (x2, y2) = (p2.timestamp as f64, p2.price);

    let slope = (y2 - y1) / (x2 - x1);
    let intercept = y1 - slope * x1;

    Some(Line {
        id: PairKey::new(p1.id, p2.id),
        point1: *p1,
        point2: *p2,
        slope,
        intercept,
        kind: LineKind::for_pivot(p1.kind),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;
    const INTERVAL: i64 = 900_000;

    fn pivot(id: u64, timestamp: i64, price: f64, kind: PivotKind) -> Pivot {
        Pivot {
            id,
            timestamp,
            price,
            kind,
        }
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(PairKey::new(7, 2), PairKey::new(2, 7));
        assert_eq!(PairKey::new(7, 2).first(), 2);
        assert_eq!(PairKey::new(7, 2).second(), 7);
        assert_eq!(PairKey::new(7, 2).to_string(), "line_2_7");
        assert!(PairKey::new(2, 7).contains(7));
        assert!(!PairKey::new(2, 7).contains(3));
    }

    #[test]
    fn test_slope_and_intercept() {
        let p1 = pivot(0, T0, 95000.0, PivotKind::Peak);
        let p2 = pivot(1, T0 + INTERVAL, 99000.0, PivotKind::Peak);
        let line = build_line(&p1, &p2).unwrap();

        assert_eq!(line.kind, LineKind::Upper);
        assert!((line.slope - 4000.0 / 900_000.0).abs() < 1e-12);
        assert!((line.price_at(T0) - 95000.0).abs() < 1e-3);
        assert!((line.price_at(T0 + INTERVAL) - 99000.0).abs() < 1e-3);
    }

    #[test]
    fn test_endpoint_order_is_irrelevant() {
        let p1 = pivot(3, T0, 94500.0, PivotKind::Trough);
        let p2 = pivot(5, T0 + 5 * INTERVAL, 95000.0, PivotKind::Trough);
        let forward = build_line(&p1, &p2).unwrap();
        let backward = build_line(&p2, &p1).unwrap();

        assert_eq!(forward.id, backward.id);
        assert_eq!(forward.kind, LineKind::Lower);
        assert!((forward.slope - backward.slope).abs() < 1e-12);
        assert!((forward.price_at(T0 + INTERVAL) - backward.price_at(T0 + INTERVAL)).abs() < 1e-3);
        assert_eq!(forward.span(), (T0, T0 + 5 * INTERVAL));
    }

    #[test]
    fn test_vertical_line_is_skipped() {
        let p1 = pivot(0, T0, 95000.0, PivotKind::Peak);
        let p2 = pivot(1, T0, 96000.0, PivotKind::Peak);
        assert!(build_line(&p1, &p2).is_none());
    }
}
