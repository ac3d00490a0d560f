use alloy_primitives::{Address, U256};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub token: Address,
    pub amount: U256,
}

/// Remembers every deployment key ever decoded. Keys are recorded before
/// enrichment or delivery and are never removed, so a delivery failure is
/// not retried but a repeated log is never announced twice.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<DedupKey>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the key was new and is now recorded.
    pub fn record(&mut self, key: DedupKey) -> bool {
        self.seen.insert(key)
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
