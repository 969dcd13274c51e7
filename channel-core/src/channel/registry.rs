// channel-core/src/channel/registry.rs
// Ein Detector pro Instrument; der DashMap-Eintrag ist die exklusive Sperre pro add_pivot

use channel_common::data::PivotRecord;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::debug;

use super::detector::{ChannelDetector, DetectorSnapshot};
use super::line::Line;
use crate::config::ChannelConfig;
use crate::errors::{ChannelError, ChannelResult};

pub struct ChannelRegistry {
    config: ChannelConfig,
    detectors: DashMap<String, ChannelDetector>,
}

impl ChannelRegistry {
    pub fn new(config: ChannelConfig) -> ChannelResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            detectors: DashMap::new(),
        })
    }

    fn detector_mut(&self, symbol: &str) -> ChannelResult<RefMut<'_, String, ChannelDetector>> {
        if let Some(detector) = self.detectors.get_mut(symbol) {
            return Ok(detector);
        }
        let fresh = ChannelDetector::new(self.config.clone())?;
        debug!("New detector for {}", symbol);
        Ok(self.detectors.entry(symbol.to_string()).or_insert(fresh))
    }

    /// Runs one `add_pivot` for `symbol` while holding its entry exclusively.
    pub fn add_pivot(&self, symbol: &str, record: &PivotRecord) -> ChannelResult<Option<u64>> {
        let mut detector = self.detector_mut(symbol)?;
        Ok(detector.add_pivot(record))
    }

    /// Replays independent instruments in parallel, each batch in order.
    ///
    /// A symbol may appear in only one batch; two batches for the same
    /// detector would interleave and break its time order.
    pub fn replay_parallel(
        &self,
        batches: Vec<(String, Vec<PivotRecord>)>,
    ) -> ChannelResult<Vec<(String, Vec<u64>)>> {
        let mut seen = HashSet::with_capacity(batches.len());
        for (symbol, _) in &batches {
            if !seen.insert(symbol.as_str()) {
                return Err(ChannelError::invalid(
                    "batches",
                    &format!("symbol {} appears in more than one batch", symbol),
                ));
            }
        }

        batches
            .into_par_iter()
            .map(|(symbol, records)| -> ChannelResult<(String, Vec<u64>)> {
                let ids: Vec<u64> = records
                    .iter()
                    .map(|record| self.add_pivot(&symbol, record))
                    .collect::<ChannelResult<Vec<_>>>()?
                    .into_iter()
                    .flatten()
                    .collect();
                Ok((symbol, ids))
            })
            .collect()
    }

    pub fn snapshot(&self, symbol: &str) -> Option<DetectorSnapshot> {
        self.detectors.get(symbol).map(|d| d.snapshot())
    }

    pub fn upper_lines(&self, symbol: &str) -> Vec<Line> {
        self.detectors
            .get(symbol)
            .map(|d| d.upper_lines().to_vec())
            .unwrap_or_default()
    }

    pub fn lower_lines(&self, symbol: &str) -> Vec<Line> {
        self.detectors
            .get(symbol)
            .map(|d| d.lower_lines().to_vec())
            .unwrap_or_default()
    }

    /// Returns `false` if no detector exists for `symbol`.
    pub fn reset(&self, symbol: &str) -> bool {
        match self.detectors.get_mut(symbol) {
            Some(mut detector) => {
                detector.reset();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, symbol: &str) -> Option<ChannelDetector> {
        self.detectors.remove(symbol).map(|(_, d)| d)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.detectors.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}
