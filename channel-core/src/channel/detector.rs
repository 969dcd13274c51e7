// channel-core/src/channel/detector.rs
// Inkrementelle Engine: neue Pivots -> neue Linien -> Validierung des Gesamtbestands

use channel_common::data::{Candle, Pivot, PivotKind, PivotRecord};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use super::combination::{ChannelCombination, CombinationStore};
use super::line::{build_line, Line, LineKind, PairKey};
use super::validator::{LineValidator, Validation};
use super::window::WindowStore;
use crate::config::ChannelConfig;
use crate::errors::ChannelResult;

/// Read-only diagnostic view of a detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorSnapshot {
    pub num_peaks: usize,
    pub num_troughs: usize,
    pub num_candles: usize,
    pub num_upper_lines: usize,
    pub num_lower_lines: usize,
    pub num_combinations: usize,
    pub next_pivot_id: u64,
    pub peak_ids: Vec<u64>,
    pub trough_ids: Vec<u64>,
}

/// Channel boundary detector for one instrument.
///
/// Every pivot is paired with the resident pivots of the same kind it has not
/// been paired with yet; the full upper and lower line sets are then
/// re-validated against the current candle window. Not thread-safe by itself;
/// see [`ChannelRegistry`](super::registry::ChannelRegistry) for shared use.
#[derive(Debug, Clone)]
pub struct ChannelDetector {
    config: ChannelConfig,
    validator: LineValidator,
    window: WindowStore,
    combinations: CombinationStore,
}

impl ChannelDetector {
    pub fn new(config: ChannelConfig) -> ChannelResult<Self> {
        config.validate()?;

        info!(
            "ChannelDetector: max_pivots={}, max_age_ms={:?}, dH={}",
            config.max_pivots,
            config.max_age_ms,
            config.channel_width()
        );
        debug!(
            "Validation: max_slope={:?}, min_distance_candles={}, max_penetration_pct={}%, max_penetrating_candles={}",
            config.max_slope,
            config.min_distance_candles,
            config.max_penetration_pct,
            config.max_penetrating_candles
        );

        Ok(Self {
            validator: LineValidator::from_config(&config),
            window: WindowStore::new(config.max_pivots, config.max_age_ms),
            combinations: CombinationStore::default(),
            config,
        })
    }

    /// Processes one upstream record. Returns the id assigned to its pivot,
    /// or `None` for a candle-only record.
    pub fn add_pivot(&mut self, record: &PivotRecord) -> Option<u64> {
        if let Some(candle) = record.candle {
            self.window.ingest_candle(candle);
        }

        let input = record.pivot.as_ref()?;
        let id = self.window.ingest_pivot(input);

        let removed = self.window.evict_stale();
        if !removed.is_empty() {
            let dropped = self.window.drop_lines_touching(&removed);
            self.combinations.forget_lines(&dropped);
            self.window.sync_candles_to_oldest_pivot();
        }

        if self.generate_lines(id, input.kind) > 0 {
            self.revalidate();
        }

        Some(id)
    }

    /// Feeds records in order and returns the ids of the pivots among them.
    pub fn add_records<'a, I>(&mut self, records: I) -> Vec<u64>
    where
        I: IntoIterator<Item = &'a PivotRecord>,
    {
        records
            .into_iter()
            .filter_map(|record| self.add_pivot(record))
            .collect()
    }

    /// Pairs the new pivot with every resident pivot of its kind not yet paired.
    fn generate_lines(&mut self, new_id: u64, kind: PivotKind) -> usize {
        let pivots = self.window.pivots(kind);
        let Some(new_pivot) = pivots.iter().find(|p| p.id == new_id).copied() else {
            return 0;
        };

        let mut fresh = Vec::new();
        for old in pivots.iter().filter(|p| p.id != new_id) {
            let key = PairKey::new(old.id, new_id);
            if self.window.is_generated(&key) {
                continue;
            }
            match build_line(old, &new_pivot) {
                Some(line) => {
                    debug!("Created {} line {} (slope={:.8})", line.kind.as_str(), key, line.slope);
                    fresh.push(line);
                }
                None => debug!("Skipped {}: endpoints share timestamp {}", key, old.timestamp),
            }
        }

        let count = fresh.len();
        for line in fresh {
            self.window.insert_line(line);
        }
        count
    }

    /// Re-runs the validator over every resident line and drops the failures.
    fn revalidate(&mut self) {
        let validator = &self.validator;
        let mut dropped = Vec::new();

        for kind in [LineKind::Upper, LineKind::Lower] {
            let rejected = self.window.retain_lines(kind, |line, candles| {
                match validator.validate(line, candles) {
                    Validation::Accepted => true,
                    Validation::Rejected(reason) => {
                        debug!("Rejected {} line {}: {}", kind.as_str(), line.id, reason);
                        false
                    }
                }
            });
            dropped.extend(rejected.into_iter().map(|line| line.id));
        }

        self.combinations.forget_lines(&dropped);
    }

    /// Validates `line` against the current candle window without touching state.
    pub fn validate_line(&self, line: &Line) -> Validation {
        self.validator.validate(line, self.window.candles())
    }

    pub fn create_line(&self, p1: &Pivot, p2: &Pivot) -> Option<Line> {
        build_line(p1, p2)
    }

    /// Stores an upper/lower pairing for a later ranking stage. Both lines must
    /// be resident; returns `false` otherwise or if the pair is already stored.
    pub fn record_combination(&mut self, upper: PairKey, lower: PairKey) -> bool {
        let resident = |lines: &[Line], key: PairKey| lines.iter().any(|l| l.id == key);
        if !resident(self.window.upper_lines(), upper) || !resident(self.window.lower_lines(), lower) {
            return false;
        }
        self.combinations.insert(ChannelCombination { upper, lower })
    }

    pub fn reset(&mut self) {
        self.window.reset();
        self.combinations.clear();
        info!("ChannelDetector reset");
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        DetectorSnapshot {
            num_peaks: self.window.peaks().len(),
            num_troughs: self.window.troughs().len(),
            num_candles: self.window.candles().len(),
            num_upper_lines: self.window.upper_lines().len(),
            num_lower_lines: self.window.lower_lines().len(),
            num_combinations: self.combinations.len(),
            next_pivot_id: self.window.next_pivot_id(),
            peak_ids: self.window.peaks().iter().map(|p| p.id).collect(),
            trough_ids: self.window.troughs().iter().map(|t| t.id).collect(),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn peaks(&self) -> &VecDeque<Pivot> {
        self.window.peaks()
    }

    pub fn troughs(&self) -> &VecDeque<Pivot> {
        self.window.troughs()
    }

    pub fn candles(&self) -> &VecDeque<Candle> {
        self.window.candles()
    }

    pub fn upper_lines(&self) -> &[Line] {
        self.window.upper_lines()
    }

    pub fn lower_lines(&self) -> &[Line] {
        self.window.lower_lines()
    }

    pub fn combinations(&self) -> &[ChannelCombination] {
        self.combinations.as_slice()
    }

    pub fn is_generated(&self, key: &PairKey) -> bool {
        self.window.is_generated(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::validator::Rejection;
    use crate::errors::ChannelError;
    use channel_common::data::PivotInput;

    const T0: i64 = 1_700_000_000_000;
    const INTERVAL: i64 = 900_000;

    fn ts(i: f64) -> i64 {
        T0 + (i * INTERVAL as f64) as i64
    }

    fn config() -> ChannelConfig {
        ChannelConfig {
            max_pivots: 5,
            max_slope: Some(0.0005),
            min_distance_candles: 2.0,
            max_penetration_pct: 0.3,
            max_penetrating_candles: 2,
            ..ChannelConfig::default()
        }
    }

    fn detector(config: ChannelConfig) -> ChannelDetector {
        ChannelDetector::new(config).unwrap()
    }

    fn peak(d: &mut ChannelDetector, i: f64, price: f64) -> Option<u64> {
        let t = ts(i);
        d.add_pivot(&PivotRecord::with_pivot(
            Candle::new(t, price - 100.0, price, price - 300.0, price - 150.0, 1.0),
            PivotInput::peak(t, price),
        ))
    }

    fn trough(d: &mut ChannelDetector, i: f64, price: f64) -> Option<u64> {
        let t = ts(i);
        d.add_pivot(&PivotRecord::with_pivot(
            Candle::new(t, price + 100.0, price + 300.0, price, price + 150.0, 1.0),
            PivotInput::trough(t, price),
        ))
    }

    fn bare(d: &mut ChannelDetector, pivot: PivotInput) -> Option<u64> {
        d.add_pivot(&PivotRecord {
            candle: None,
            pivot: Some(pivot),
        })
    }

    fn candle(d: &mut ChannelDetector, i: f64, low: f64, high: f64) {
        let id = d.add_pivot(&PivotRecord::candle_only(Candle::new(
            ts(i),
            low,
            high,
            low,
            high,
            1.0,
        )));
        assert!(id.is_none());
    }

    fn keys(lines: &[Line]) -> Vec<PairKey> {
        lines.iter().map(|l| l.id).collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = ChannelConfig {
            candle_interval_ms: 0,
            ..config()
        };
        assert!(matches!(
            ChannelDetector::new(cfg),
            Err(ChannelError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_candle_only_record() {
        let mut d = detector(config());
        candle(&mut d, 0.0, 95000.0, 95500.0);

        let snap = d.snapshot();
        assert_eq!(snap.num_candles, 1);
        assert_eq!(snap.next_pivot_id, 0);
        assert!(snap.peak_ids.is_empty());
    }

    #[test]
    fn test_steep_upper_line_rejected() {
        let mut d = detector(config());
        assert_eq!(peak(&mut d, 0.0, 95000.0), Some(0));
        assert_eq!(peak(&mut d, 1.0, 99000.0), Some(1));
        assert!(d.upper_lines().is_empty());
        assert!(!d.is_generated(&PairKey::new(0, 1)));

        let line = d.create_line(&d.peaks()[0], &d.peaks()[1]).unwrap();
        let verdict = d.validate_line(&line);
        assert!(matches!(
            verdict,
            Validation::Rejected(Rejection::SlopeExceedsBound { .. })
        ));
        assert!(verdict.reason().contains("slope"));
    }

    #[test]
    fn test_close_troughs_rejected() {
        let mut d = detector(config());
        trough(&mut d, 0.0, 95000.0); // 0
        peak(&mut d, 1.0, 96000.0); // 1
        trough(&mut d, 2.0, 94800.0); // 2
        trough(&mut d, 2.5, 94700.0); // 3, half a candle after #2

        assert_eq!(
            keys(d.lower_lines()),
            vec![PairKey::new(0, 2), PairKey::new(0, 3)]
        );
        assert!(!d.is_generated(&PairKey::new(2, 3)));

        let line = d.create_line(&d.troughs()[1], &d.troughs()[2]).unwrap();
        assert!(d.validate_line(&line).reason().contains("too close"));
    }

    #[test]
    fn test_penetrated_upper_line_rejected() {
        let mut d = detector(config());
        peak(&mut d, 0.0, 96000.0);
        candle(&mut d, 1.0, 95500.0, 95800.0);
        candle(&mut d, 2.0, 95600.0, 97000.0);
        candle(&mut d, 3.0, 95500.0, 95800.0);
        peak(&mut d, 4.0, 96000.0);

        assert!(d.upper_lines().is_empty());

        let line = d.create_line(&d.peaks()[0], &d.peaks()[1]).unwrap();
        assert!(matches!(
            d.validate_line(&line),
            Validation::Rejected(Rejection::PenetrationTooDeep { .. })
        ));
    }

    #[test]
    fn test_clean_lower_line_accepted() {
        let mut d = detector(config());
        trough(&mut d, 0.0, 94500.0);
        for i in 1..5 {
            candle(&mut d, i as f64, 95300.0, 95600.0);
        }
        trough(&mut d, 5.0, 95000.0);

        assert_eq!(keys(d.lower_lines()), vec![PairKey::new(0, 1)]);
        let verdict = d.validate_line(&d.lower_lines()[0]);
        assert!(verdict.is_accepted());
        assert_eq!(verdict.reason(), "OK");

        let snap = d.snapshot();
        assert_eq!(snap.num_lower_lines, 1);
        assert_eq!(snap.num_candles, 6);
        assert_eq!(snap.trough_ids, vec![0, 1]);
    }

    #[test]
    fn test_each_pair_built_once() {
        let mut d = detector(config());
        for (n, price) in [96000.0, 96100.0, 96200.0, 96300.0].iter().enumerate() {
            bare(&mut d, PivotInput::peak(ts(3.0 * n as f64), *price));
        }

        let mut ids = keys(d.upper_lines());
        assert_eq!(ids.len(), 6);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert!(d.lower_lines().is_empty());
    }

    #[test]
    fn test_eviction_cascades_to_lines() {
        let cfg = ChannelConfig {
            max_pivots: 3,
            ..config()
        };
        let mut d = detector(cfg);
        for n in 0..5 {
            bare(&mut d, PivotInput::peak(ts(3.0 * n as f64), 96000.0 + n as f64 * 10.0));
        }

        assert_eq!(d.snapshot().peak_ids, vec![2, 3, 4]);
        let mut ids = keys(d.upper_lines());
        ids.sort();
        assert_eq!(
            ids,
            vec![PairKey::new(2, 3), PairKey::new(2, 4), PairKey::new(3, 4)]
        );
        assert!(!d.is_generated(&PairKey::new(0, 1)));
        assert!(!d.is_generated(&PairKey::new(1, 2)));
    }

    #[test]
    fn test_eviction_drops_old_candles() {
        let cfg = ChannelConfig {
            max_pivots: 1,
            ..config()
        };
        let mut d = detector(cfg);
        peak(&mut d, 0.0, 96000.0);
        candle(&mut d, 1.0, 95000.0, 95500.0);
        trough(&mut d, 2.0, 94000.0);
        candle(&mut d, 3.0, 95000.0, 95500.0);
        peak(&mut d, 4.0, 96100.0);

        // peak #0 evicted, oldest resident pivot is the trough at 2
        assert_eq!(d.snapshot().peak_ids, vec![2]);
        assert_eq!(d.candles().front().map(|c| c.timestamp), Some(ts(2.0)));
        assert_eq!(d.candles().len(), 3);
    }

    #[test]
    fn test_late_stale_pivot_is_aged_out_with_its_lines() {
        let cfg = ChannelConfig {
            max_pivots: 10,
            max_age_ms: Some(5 * INTERVAL),
            ..config()
        };
        let mut d = detector(cfg);
        peak(&mut d, 10.0, 96000.0);
        peak(&mut d, 2.0, 96000.0);
        assert_eq!(keys(d.upper_lines()), vec![PairKey::new(0, 1)]);

        peak(&mut d, 12.0, 96000.0);

        assert_eq!(d.snapshot().peak_ids, vec![0, 2]);
        assert_eq!(keys(d.upper_lines()), vec![PairKey::new(0, 2)]);
        assert!(!d.is_generated(&PairKey::new(0, 1)));
        assert!(d.candles().iter().all(|c| c.timestamp >= ts(10.0)));
        assert_eq!(d.candles().len(), 2);
    }

    #[test]
    fn test_full_revalidation_drops_stale_acceptance() {
        let mut d = detector(config());
        bare(&mut d, PivotInput::peak(ts(0.0), 96000.0));
        bare(&mut d, PivotInput::peak(ts(4.0), 96000.0));
        assert_eq!(keys(d.upper_lines()), vec![PairKey::new(0, 1)]);

        // the candles between the two peaks only arrive afterwards
        candle(&mut d, 1.0, 95500.0, 95800.0);
        candle(&mut d, 2.0, 95600.0, 97000.0);
        candle(&mut d, 3.0, 95500.0, 95800.0);
        for i in 5..8 {
            candle(&mut d, i as f64, 95500.0, 95800.0);
        }
        assert_eq!(d.upper_lines().len(), 1);

        peak(&mut d, 8.0, 96000.0);

        assert_eq!(keys(d.upper_lines()), vec![PairKey::new(1, 2)]);
        assert!(!d.is_generated(&PairKey::new(0, 1)));
        assert!(!d.is_generated(&PairKey::new(0, 2)));
    }

    #[test]
    fn test_reset_reproduces_identical_state() {
        fn run(d: &mut ChannelDetector) -> Vec<u64> {
            let mut ids = Vec::new();
            ids.extend(trough(d, 0.0, 95000.0));
            ids.extend(peak(d, 1.0, 96000.0));
            ids.extend(trough(d, 3.0, 94900.0));
            ids.extend(peak(d, 4.0, 96050.0));
            candle(d, 5.0, 95200.0, 95700.0);
            ids.extend(trough(d, 6.0, 94950.0));
            ids.extend(peak(d, 7.0, 96100.0));
            ids
        }

        let mut d = detector(config());
        let first_ids = run(&mut d);
        let upper = d.upper_lines().to_vec();
        let lower = d.lower_lines().to_vec();
        let snap = d.snapshot();
        assert!(!upper.is_empty());
        assert!(!lower.is_empty());

        d.reset();
        assert_eq!(d.snapshot().next_pivot_id, 0);
        assert_eq!(d.snapshot().num_candles, 0);

        let second_ids = run(&mut d);
        assert_eq!(first_ids, second_ids);
        assert_eq!(first_ids, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(d.upper_lines(), upper.as_slice());
        assert_eq!(d.lower_lines(), lower.as_slice());
        assert_eq!(d.snapshot(), snap);
    }

    #[test]
    fn test_combinations_follow_line_lifetime() {
        let cfg = ChannelConfig {
            max_pivots: 2,
            ..config()
        };
        let mut d = detector(cfg);
        bare(&mut d, PivotInput::trough(ts(0.0), 95000.0)); // 0
        bare(&mut d, PivotInput::peak(ts(1.0), 96000.0)); // 1
        bare(&mut d, PivotInput::trough(ts(5.0), 95100.0)); // 2
        bare(&mut d, PivotInput::peak(ts(6.0), 96100.0)); // 3

        let upper = PairKey::new(1, 3);
        let lower = PairKey::new(0, 2);
        assert!(d.record_combination(upper, lower));
        assert!(!d.record_combination(upper, lower));
        assert!(!d.record_combination(lower, upper));
        assert_eq!(d.snapshot().num_combinations, 1);

        // evicts peak #1 and with it the upper line
        bare(&mut d, PivotInput::peak(ts(11.0), 96200.0));
        assert_eq!(keys(d.upper_lines()), vec![PairKey::new(3, 4)]);
        assert!(d.combinations().is_empty());
    }
}
