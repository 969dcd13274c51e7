// channel-core/src/channel/combination.rs
// Reserviert für die Kombination oberer + unterer Linien zu einem Kanal.
// Die Auswahl selbst ist noch nicht implementiert; hier liegt nur die Ablage.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::line::PairKey;

/// An upper and a lower line considered together as one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelCombination {
    pub upper: PairKey,
    pub lower: PairKey,
}

#[derive(Debug, Clone, Default)]
pub struct CombinationStore {
    combinations: Vec<ChannelCombination>,
    created: HashSet<ChannelCombination>,
}

impl CombinationStore {
    /// Returns `false` if the combination is already stored.
    pub fn insert(&mut self, combination: ChannelCombination) -> bool {
        if !self.created.insert(combination) {
            return false;
        }
        self.combinations.push(combination);
        true
    }

    /// Drops every combination that references one of `dropped` lines.
    pub fn forget_lines(&mut self, dropped: &[PairKey]) -> usize {
        if dropped.is_empty() {
            return 0;
        }
        let before = self.combinations.len();
        let created = &mut self.created;
        self.combinations.retain(|c| {
            let stale = dropped.contains(&c.upper) || dropped.contains(&c.lower);
            if stale {
                created.remove(c);
            }
            !stale
        });
        before - self.combinations.len()
    }

    pub fn as_slice(&self) -> &[ChannelCombination] {
        &self.combinations
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn clear(&mut self) {
        self.combinations.clear();
        self.created.clear();
    }
}
