//! Seen-transaction registry
//!
//! Transaction ids already emitted, keyed by confirmed round. Rounds below
//! the indexer's current round can never be returned by a `min-round` query
//! again, so they are evicted after each cycle.

use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Default)]
pub struct SeenRegistry {
    rounds: BTreeMap<u64, HashSet<String>>,
}

impl SeenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, round: u64, id: &str) -> bool {
        self.rounds
            .get(&round)
            .map_or(false, |ids| ids.contains(id))
    }

    /// Record an id; returns false if it was already present at this round
    pub fn insert(&mut self, round: u64, id: &str) -> bool {
        if self.contains(round, id) {
            return false;
        }
        self.rounds.entry(round).or_default().insert(id.to_string())
    }

    /// Drop every round strictly below `round`, returning how many were dropped
    pub fn evict_below(&mut self, round: u64) -> usize {
        let kept = self.rounds.split_off(&round);
        std::mem::replace(&mut self.rounds, kept).len()
    }

    pub fn rounds(&self) -> impl Iterator<Item = u64> + '_ {
        self.rounds.keys().copied()
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.rounds.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}
