// channel-core/src/channel/validator.rs
// Validierung einzelner Linien: Steigung, Mindestabstand, Penetration

use channel_common::data::Candle;
use serde::Serialize;
use std::fmt;

use super::line::{Line, LineKind};
use crate::config::ChannelConfig;

/// Why a line was not accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Rejection {
    SlopeExceedsBound { slope: f64, max: f64 },
    EndpointsTooClose { candles: f64, min: f64 },
    TooManyPenetratingCandles { count: usize, max: usize },
    PenetrationTooDeep { timestamp: i64, pct: f64, max: f64 },
    /// The fitted line is at or below zero between its endpoints, so no
    /// percentage can be measured against it.
    NonPositiveLinePrice { timestamp: i64, price: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SlopeExceedsBound { slope, max } => {
                write!(f, "slope exceeds bound: |{:.6}| > {}", slope, max)
            }
            Rejection::EndpointsTooClose { candles, min } => {
                write!(f, "endpoints too close: {:.1} candles < {}", candles, min)
            }
            Rejection::TooManyPenetratingCandles { count, max } => {
                write!(f, "too many penetrating candles: {} > {}", count, max)
            }
            Rejection::PenetrationTooDeep { timestamp, pct, max } => {
                write!(
                    f,
                    "penetration too deep: {:.2}% > {}% at {}",
                    pct, max, timestamp
                )
            }
            Rejection::NonPositiveLinePrice { timestamp, price } => {
                write!(f, "non-positive line price {} at {}", price, timestamp)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Accepted,
    Rejected(Rejection),
}

impl Validation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Validation::Accepted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Validation::Accepted => None,
            Validation::Rejected(r) => Some(r),
        }
    }

    /// `"OK"` for accepted lines, the rejection message otherwise.
    pub fn reason(&self) -> String {
        match self {
            Validation::Accepted => "OK".to_string(),
            Validation::Rejected(r) => r.to_string(),
        }
    }
}

/// A candle crossing a line between the line's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Penetration {
    pub timestamp: i64,
    pub line_price: f64,
    /// Depth in percent of `line_price`.
    pub pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PenetrationReport {
    pub candles_between: usize,
    pub penetrations: Vec<Penetration>,
}

impl PenetrationReport {
    pub fn count(&self) -> usize {
        self.penetrations.len()
    }

    pub fn deepest(&self) -> Option<&Penetration> {
        self.penetrations
            .iter()
            .max_by(|a, b| a.pct.total_cmp(&b.pct))
    }
}

/// Three-stage acceptance test, short-circuiting on the first failure.
#[derive(Debug, Clone, PartialEq)]
pub struct LineValidator {
    max_slope: Option<f64>,
    candle_interval_ms: i64,
    min_distance_candles: f64,
    max_penetration_pct: f64,
    max_penetrating_candles: usize,
}

impl LineValidator {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            max_slope: config.max_slope,
            candle_interval_ms: config.candle_interval_ms,
            min_distance_candles: config.min_distance_candles,
            max_penetration_pct: config.max_penetration_pct,
            max_penetrating_candles: config.max_penetrating_candles,
        }
    }

    pub fn validate<'c, I>(&self, line: &Line, candles: I) -> Validation
    where
        I: IntoIterator<Item = &'c Candle>,
    {
        // 1. Steigung
        if let Some(max) = self.max_slope {
            if line.slope.abs() > max {
                return Validation::Rejected(Rejection::SlopeExceedsBound {
                    slope: line.slope,
                    max,
                });
            }
        }

        // 2. Abstand in nominalen Kerzen
        let candle_span = self.candle_span(line);
        if candle_span < self.min_distance_candles {
            return Validation::Rejected(Rejection::EndpointsTooClose {
                candles: candle_span,
                min: self.min_distance_candles,
            });
        }

        // 3. Penetration
        let report = match self.penetration_report(line, candles) {
            Ok(report) => report,
            Err(rejection) => return Validation::Rejected(rejection),
        };

        if report.count() > self.max_penetrating_candles {
            return Validation::Rejected(Rejection::TooManyPenetratingCandles {
                count: report.count(),
                max: self.max_penetrating_candles,
            });
        }

        if let Some(p) = report
            .deepest()
            .filter(|p| p.pct > self.max_penetration_pct)
        {
            return Validation::Rejected(Rejection::PenetrationTooDeep {
                timestamp: p.timestamp,
                pct: p.pct,
                max: self.max_penetration_pct,
            });
        }

        Validation::Accepted
    }

    /// Endpoint distance measured in nominal candle widths.
    pub fn candle_span(&self, line: &Line) -> f64 {
        let (start, end) = line.span();
        (end as f64 - start as f64) / self.candle_interval_ms as f64
    }

    /// Collects every candle strictly between the endpoints whose high (upper
    /// line) or low (lower line) crosses the line.
    ///
    /// Fails with [`Rejection::NonPositiveLinePrice`] as soon as the line price
    /// at an intervening candle is not a positive finite number.
    pub fn penetration_report<'c, I>(
        &self,
        line: &Line,
        candles: I,
    ) -> Result<PenetrationReport, Rejection>
    where
        I: IntoIterator<Item = &'c Candle>,
    {
        let (start, end) = line.span();
        let mut report = PenetrationReport::default();

        for candle in candles
            .into_iter()
            .filter(|c| c.timestamp > start && c.timestamp < end)
        {
            report.candles_between += 1;

            let line_price = line.price_at(candle.timestamp);
            if !(line_price.is_finite() && line_price > 0.0) {
                return Err(Rejection::NonPositiveLinePrice {
                    timestamp: candle.timestamp,
                    price: line_price,
                });
            }

            let depth = match line.kind {
                LineKind::Upper if candle.high > line_price => candle.high - line_price,
                LineKind::Lower if candle.low < line_price => line_price - candle.low,
                _ => continue,
            };

            report.penetrations.push(Penetration {
                timestamp: candle.timestamp,
                line_price,
                pct: depth / line_price * 100.0,
            });
        }

        Ok(report)
    }
}
