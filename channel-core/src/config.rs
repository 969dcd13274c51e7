// channel-core/src/config.rs
// Konfiguration des Channel-Detectors: Defaults, optionale Datei, Environment

use crate::errors::{ChannelError, ChannelResult};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Detector options. Fixed at construction, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Cap on resident peaks and, independently, on resident troughs.
    pub max_pivots: usize,
    /// Age cap relative to the newest pivot of the same list. `None` disables it.
    #[serde(default)]
    pub max_age_ms: Option<i64>,
    /// Nominal duration of one candle, only used for the spacing check.
    pub candle_interval_ms: i64,
    /// Cap on `|slope|` in price per millisecond. `None` disables it.
    #[serde(default)]
    pub max_slope: Option<f64>,
    pub min_distance_candles: f64,
    /// Maximum single-candle penetration, in percent of the line price.
    pub max_penetration_pct: f64,
    pub max_penetrating_candles: usize,
    /// Depth `H` of the upstream turning-point detector.
    pub zigzag_depth: f64,
    /// Price value of one pip.
    pub point: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_pivots: 10,
            max_age_ms: None,
            candle_interval_ms: 15 * 60 * 1000,
            max_slope: None,
            min_distance_candles: 3.0,
            max_penetration_pct: 0.3,
            max_penetrating_candles: 2,
            zigzag_depth: 5000.0,
            point: 0.1,
        }
    }
}

impl ChannelConfig {
    /// Reference channel width `dH = H * point`.
    pub fn channel_width(&self) -> f64 {
        self.zigzag_depth * self.point
    }

    pub fn validate(&self) -> ChannelResult<()> {
        if self.max_pivots == 0 {
            return Err(ChannelError::invalid("max_pivots", "must be at least 1"));
        }
        if self.candle_interval_ms <= 0 {
            return Err(ChannelError::invalid(
                "candle_interval_ms",
                "must be positive",
            ));
        }
        if let Some(age) = self.max_age_ms {
            if age <= 0 {
                return Err(ChannelError::invalid("max_age_ms", "must be positive"));
            }
        }
        if let Some(slope) = self.max_slope {
            if !(slope >= 0.0) {
                return Err(ChannelError::invalid("max_slope", "must be non-negative"));
            }
        }
        if !(self.min_distance_candles >= 0.0) {
            return Err(ChannelError::invalid(
                "min_distance_candles",
                "must be non-negative",
            ));
        }
        if !self.max_penetration_pct.is_finite() || self.max_penetration_pct < 0.0 {
            return Err(ChannelError::invalid(
                "max_penetration_pct",
                "must be a finite, non-negative percentage",
            ));
        }
        Ok(())
    }
}

pub struct ChannelSettings;

impl ChannelSettings {
    /// Defaults, then `channel.toml` (optional), then `CHANNEL__*` variables.
    pub fn new() -> ChannelResult<ChannelConfig> {
        Self::build(
            Self::defaults()?
                .add_source(File::with_name("channel").required(false))
                .add_source(Environment::with_prefix("CHANNEL").separator("__")),
        )
    }

    /// Defaults overlaid with one required file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ChannelResult<ChannelConfig> {
        Self::build(Self::defaults()?.add_source(File::from(path.as_ref()).required(true)))
    }

    fn defaults() -> ChannelResult<config::ConfigBuilder<config::builder::DefaultState>> {
        let d = ChannelConfig::default();
        Ok(Config::builder()
            .set_default("max_pivots", d.max_pivots as i64)?
            .set_default("candle_interval_ms", d.candle_interval_ms)?
            .set_default("min_distance_candles", d.min_distance_candles)?
            .set_default("max_penetration_pct", d.max_penetration_pct)?
            .set_default("max_penetrating_candles", d.max_penetrating_candles as i64)?
            .set_default("zigzag_depth", d.zigzag_depth)?
            .set_default("point", d.point)?)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ChannelResult<ChannelConfig> {
        let settings: ChannelConfig = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
