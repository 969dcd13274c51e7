// channel-core/src/channel/window.rs
// Sliding Window: Peaks, Troughs, Kerzen und die residenten Linien

use channel_common::data::{Candle, Pivot, PivotInput, PivotKind};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

use super::line::{Line, LineKind, PairKey};

/// Bounded, time-ordered pivot and candle storage plus the resident line sets.
///
/// Peaks and troughs are capped independently by count and, optionally, by
/// age relative to the newest pivot of the same list. Candles are kept only
/// while they are not older than the oldest resident pivot.
#[derive(Debug, Clone)]
pub struct WindowStore {
    max_pivots: usize,
    max_age_ms: Option<i64>,

    peaks: VecDeque<Pivot>,
    troughs: VecDeque<Pivot>,
    candles: VecDeque<Candle>,

    upper_lines: Vec<Line>,
    lower_lines: Vec<Line>,
    generated_pairs: HashSet<PairKey>,

    next_pivot_id: u64,
}

impl WindowStore {
    pub fn new(max_pivots: usize, max_age_ms: Option<i64>) -> Self {
        Self {
            max_pivots,
            max_age_ms,
            peaks: VecDeque::with_capacity(max_pivots + 1),
            troughs: VecDeque::with_capacity(max_pivots + 1),
            candles: VecDeque::new(),
            upper_lines: Vec::new(),
            lower_lines: Vec::new(),
            generated_pairs: HashSet::new(),
            next_pivot_id: 0,
        }
    }

    // =================================================================
    // Ingestion
    // =================================================================

    pub fn ingest_candle(&mut self, candle: Candle) {
        self.candles.push_back(candle);
    }

    /// Stores the pivot under the next id and returns that id.
    pub fn ingest_pivot(&mut self, input: &PivotInput) -> u64 {
        let id = self.next_pivot_id;
        self.next_pivot_id += 1;

        let pivot = Pivot::from_input(id, input);
        let list = self.list_mut(input.kind);

        if let Some(last) = list.back() {
            if pivot.timestamp < last.timestamp {
                warn!(
                    "Out-of-order {} #{}: {} < {} (#{})",
                    pivot.kind, id, pivot.timestamp, last.timestamp, last.id
                );
            }
        }

        list.push_back(pivot);
        debug!(
            "Added {} #{}: price={}, timestamp={}",
            pivot.kind, id, pivot.price, pivot.timestamp
        );
        id
    }

    // =================================================================
    // Eviction
    // =================================================================

    /// Applies the count rule, then the age rule, to peaks and to troughs.
    /// Returns the ids of every evicted pivot.
    pub fn evict_stale(&mut self) -> Vec<u64> {
        let mut removed = Vec::new();
        Self::evict_list(&mut self.peaks, self.max_pivots, self.max_age_ms, &mut removed);
        Self::evict_list(&mut self.troughs, self.max_pivots, self.max_age_ms, &mut removed);
        removed
    }

    fn evict_list(
        list: &mut VecDeque<Pivot>,
        max_pivots: usize,
        max_age_ms: Option<i64>,
        removed: &mut Vec<u64>,
    ) {
        while list.len() > max_pivots {
            if let Some(old) = list.pop_front() {
                debug!("Evicted {} #{} (more than {} pivots)", old.kind, old.id, max_pivots);
                removed.push(old.id);
            }
        }

        let (Some(max_age), Some(latest)) = (max_age_ms, list.back().map(|p| p.timestamp)) else {
            return;
        };
        let cutoff = latest.saturating_sub(max_age);

        // Out-of-order arrivals can leave stale pivots behind the front
        list.retain(|p| {
            let stale = p.timestamp < cutoff;
            if stale {
                debug!("Evicted {} #{} (older than {} ms)", p.kind, p.id, max_age);
                removed.push(p.id);
            }
            !stale
        });
    }

    /// Timestamp of the oldest resident pivot across both lists.
    pub fn oldest_pivot_timestamp(&self) -> Option<i64> {
        self.peaks
            .iter()
            .chain(self.troughs.iter())
            .map(|p| p.timestamp)
            .min()
    }

    /// Drops candles older than the oldest resident pivot. Returns how many.
    pub fn sync_candles_to_oldest_pivot(&mut self) -> usize {
        let Some(oldest) = self.oldest_pivot_timestamp() else {
            return 0;
        };

        let before = self.candles.len();
        self.candles.retain(|c| c.timestamp >= oldest);

        let dropped = before - self.candles.len();
        if dropped > 0 {
            debug!("Dropped {} candles older than {}", dropped, oldest);
        }
        dropped
    }

    // =================================================================
    // Lines
    // =================================================================

    pub fn is_generated(&self, key: &PairKey) -> bool {
        self.generated_pairs.contains(key)
    }

    /// Registers a freshly built line and marks its pair as generated.
    pub fn insert_line(&mut self, line: Line) {
        self.generated_pairs.insert(line.id);
        match line.kind {
            LineKind::Upper => self.upper_lines.push(line),
            LineKind::Lower => self.lower_lines.push(line),
        }
    }

    /// Removes every line with an endpoint in `removed_ids` and forgets its pair.
    pub fn drop_lines_touching(&mut self, removed_ids: &[u64]) -> Vec<PairKey> {
        let mut dropped = Vec::new();

        for lines in [&mut self.upper_lines, &mut self.lower_lines] {
            lines.retain(|line| {
                let stale = removed_ids.iter().any(|&id| line.touches(id));
                if stale {
                    dropped.push(line.id);
                }
                !stale
            });
        }

        for key in &dropped {
            self.generated_pairs.remove(key);
            debug!("Dropped line {} (endpoint evicted)", key);
        }
        dropped
    }

    /// Keeps the lines of `kind` for which `keep` holds, given the current
    /// candle window. Dropped lines are returned and their pairs forgotten.
    pub fn retain_lines<F>(&mut self, kind: LineKind, mut keep: F) -> Vec<Line>
    where
        F: FnMut(&Line, &VecDeque<Candle>) -> bool,
    {
        let candles = &self.candles;
        let lines = match kind {
            LineKind::Upper => &mut self.upper_lines,
            LineKind::Lower => &mut self.lower_lines,
        };

        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(lines.len());
        for line in lines.drain(..) {
            if keep(&line, candles) {
                kept.push(line);
            } else {
                dropped.push(line);
            }
        }
        *lines = kept;

        for line in &dropped {
            self.generated_pairs.remove(&line.id);
        }
        dropped
    }

    // =================================================================
    // Accessors
    // =================================================================

    pub fn peaks(&self) -> &VecDeque<Pivot> {
        &self.peaks
    }

    pub fn troughs(&self) -> &VecDeque<Pivot> {
        &self.troughs
    }

    pub fn pivots(&self, kind: PivotKind) -> &VecDeque<Pivot> {
        match kind {
            PivotKind::Peak => &self.peaks,
            PivotKind::Trough => &self.troughs,
        }
    }

    fn list_mut(&mut self, kind: PivotKind) -> &mut VecDeque<Pivot> {
        match kind {
            PivotKind::Peak => &mut self.peaks,
            PivotKind::Trough => &mut self.troughs,
        }
    }

    pub fn candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    pub fn upper_lines(&self) -> &[Line] {
        &self.upper_lines
    }

    pub fn lower_lines(&self) -> &[Line] {
        &self.lower_lines
    }

    pub fn next_pivot_id(&self) -> u64 {
        self.next_pivot_id
    }

    pub fn reset(&mut self) {
        self.peaks.clear();
        self.troughs.clear();
        self.candles.clear();
        self.upper_lines.clear();
        self.lower_lines.clear();
        self.generated_pairs.clear();
        self.next_pivot_id = 0;
    }
}
