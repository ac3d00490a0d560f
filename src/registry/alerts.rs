use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use super::SubscriberId;
use super::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSubscription {
    pub last_touched_at: DateTime<Utc>,
    pub subscribers: BTreeSet<SubscriberId>,
}

/// Token → subscribers watching its market cap. An entry exists only while
/// its subscriber set is non-empty.
#[derive(Debug, Clone, Default)]
pub struct AlertRegistry {
    inner: Arc<Mutex<HashMap<Address, AlertSubscription>>>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; refreshes the entry's touch time either way.
    pub fn enroll(&self, token: Address, subscriber: SubscriberId) {
        let mut entries = lock(&self.inner);
        let entry = entries.entry(token).or_insert_with(|| AlertSubscription {
            last_touched_at: Utc::now(),
            subscribers: BTreeSet::new(),
        });
        entry.last_touched_at = Utc::now();
        entry.subscribers.insert(subscriber);
    }

    /// Returns true if the subscriber was watching the token.
    pub fn unenroll(&self, token: Address, subscriber: SubscriberId) -> bool {
        let mut entries = lock(&self.inner);
        let Some(entry) = entries.get_mut(&token) else {
            return false;
        };
        let removed = entry.subscribers.remove(&subscriber);
        if entry.subscribers.is_empty() {
            entries.remove(&token);
        }
        removed
    }

    /// Removes the subscriber everywhere. Returns how many tokens it left.
    pub fn clear_all(&self, subscriber: SubscriberId) -> usize {
        let mut entries = lock(&self.inner);
        let mut removed = 0;
        entries.retain(|_, entry| {
            if entry.subscribers.remove(&subscriber) {
                removed += 1;
            }
            !entry.subscribers.is_empty()
        });
        removed
    }

    pub fn is_watched(&self, token: Address) -> bool {
        lock(&self.inner).contains_key(&token)
    }

    pub fn subscribers_of(&self, token: Address) -> Vec<SubscriberId> {
        lock(&self.inner)
            .get(&token)
            .map(|entry| entry.subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn last_touched(&self, token: Address) -> Option<DateTime<Utc>> {
        lock(&self.inner).get(&token).map(|entry| entry.last_touched_at)
    }

    pub fn watched_tokens(&self) -> Vec<Address> {
        let mut tokens: Vec<Address> = lock(&self.inner).keys().copied().collect();
        tokens.sort();
        tokens
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }
}
