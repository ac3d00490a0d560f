use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use super::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
    Zh,
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "ru" | "russian" => Ok(Language::Ru),
            "zh" | "chinese" => Ok(Language::Zh),
            other => Err(anyhow::anyhow!("Unsupported language: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub require_media_link: bool,
    /// Whole USD; `None` means no market-cap alerts.
    pub market_cap_threshold: Option<u64>,
    pub language: Language,
}

/// Opted-in subscribers and their preferences. Cloning shares the same store.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<BTreeMap<SubscriberId, Preferences>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the subscriber with default preferences. Returns false if already present.
    pub fn opt_in(&self, id: SubscriberId) -> bool {
        let mut subscribers = lock(&self.inner);
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, Preferences::default());
        true
    }

    pub fn opt_out(&self, id: SubscriberId) -> bool {
        lock(&self.inner).remove(&id).is_some()
    }

    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        lock(&self.inner).contains_key(&id)
    }

    pub fn preferences(&self, id: SubscriberId) -> Option<Preferences> {
        lock(&self.inner).get(&id).copied()
    }

    pub fn set_language(&self, id: SubscriberId, language: Language) {
        self.update(id, |prefs| prefs.language = language);
    }

    pub fn set_require_media_link(&self, id: SubscriberId, required: bool) {
        self.update(id, |prefs| prefs.require_media_link = required);
    }

    /// Flips the media-link filter and returns the new value.
    pub fn toggle_media_filter(&self, id: SubscriberId) -> bool {
        let mut enabled = false;
        self.update(id, |prefs| {
            prefs.require_media_link = !prefs.require_media_link;
            enabled = prefs.require_media_link;
        });
        enabled
    }

    pub fn set_threshold(&self, id: SubscriberId, usd: u64) -> Result<()> {
        if usd == 0 {
            anyhow::bail!("Market cap threshold must be a positive amount");
        }
        self.update(id, |prefs| prefs.market_cap_threshold = Some(usd));
        Ok(())
    }

    pub fn clear_threshold(&self, id: SubscriberId) {
        self.update(id, |prefs| prefs.market_cap_threshold = None);
    }

    /// Point-in-time copy, ordered by id.
    pub fn snapshot(&self) -> Vec<(SubscriberId, Preferences)> {
        lock(&self.inner)
            .iter()
            .map(|(id, prefs)| (*id, *prefs))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }

    // Preferences are created lazily, so a mutation implies opt-in.
    fn update(&self, id: SubscriberId, apply: impl FnOnce(&mut Preferences)) {
        let mut subscribers = lock(&self.inner);
        apply(subscribers.entry(id).or_default());
    }
}
