use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{debug, error, warn};

use super::Tier;
use crate::{CacheDomain, CacheEntry, TierKind, key::domain_prefix, store::FlatStore};

/// Persistent tier over a [`FlatStore`].
///
/// Entries are stored as JSON text under their cache key, so a domain's
/// namespace is the set of keys starting with `domain:`. The same store
/// also carries auxiliary items such as the persisted stats.
pub struct FlatTier {
    store: Arc<dyn FlatStore>,
    available: AtomicBool,
}

impl FlatTier {
    pub fn new(store: Arc<dyn FlatStore>) -> Self {
        Self {
            store,
            available: AtomicBool::new(false),
        }
    }

    /// Open the store. Returns whether it is usable.
    pub fn open(&self) -> bool {
        match self.store.open() {
            Ok(()) => {
                debug!("Flat tier ready");
                self.available.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                error!("Flat store unavailable, tier disabled: {}", e);
                self.available.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Read a raw item outside any domain namespace.
    pub fn read_item(&self, key: &str) -> Option<String> {
        if !self.is_available() {
            return None;
        }
        self.store
            .get_item(key)
            .inspect_err(|e| warn!("Flat store GET error for key {}: {}", key, e))
            .ok()
            .flatten()
    }

    /// Write a raw item outside any domain namespace.
    pub fn write_item(&self, key: &str, value: String) -> bool {
        if !self.is_available() {
            return false;
        }
        match self.store.set_item(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!("Flat store SET error for key {}: {}", key, e);
                false
            }
        }
    }

    fn remove_item(&self, key: &str) {
        if !self.is_available() {
            return;
        }
        if let Err(e) = self.store.remove_item(key) {
            warn!("Flat store REMOVE error for key {}: {}", key, e);
        }
    }

    fn domain_keys(&self, domain: CacheDomain) -> Vec<String> {
        if !self.is_available() {
            return Vec::new();
        }
        let prefix = domain_prefix(domain);
        match self.store.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(&prefix)).collect(),
            Err(e) => {
                warn!("Flat store key listing failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn decode(key: &str, raw: &str) -> Option<CacheEntry> {
    match serde_json::from_str(raw) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Undecodable flat store entry {}: {}", key, e);
            None
        }
    }
}

#[async_trait]
impl Tier for FlatTier {
    fn kind(&self) -> TierKind {
        TierKind::FlatStore
    }

    async fn get(&self, _domain: CacheDomain, key: &str) -> Option<CacheEntry> {
        self.read_item(key).and_then(|raw| decode(key, &raw))
    }

    async fn set(&self, _domain: CacheDomain, entry: CacheEntry) -> bool {
        if !self.is_available() {
            return false;
        }
        match serde_json::to_string(&entry) {
            Ok(raw) => self.write_item(entry.key(), raw),
            Err(e) => {
                warn!("Failed to encode entry {}: {}", entry.key(), e);
                false
            }
        }
    }

    async fn delete(&self, _domain: CacheDomain, key: &str) {
        self.remove_item(key);
    }

    async fn scan_all(&self, domain: CacheDomain) -> Vec<CacheEntry> {
        self.domain_keys(domain)
            .into_iter()
            .filter_map(|key| self.read_item(&key).and_then(|raw| decode(&key, &raw)))
            .collect()
    }

    async fn clear(&self, domain: CacheDomain) {
        for key in self.domain_keys(domain) {
            self.remove_item(&key);
        }
    }

    async fn len(&self, domain: CacheDomain) -> usize {
        self.domain_keys(domain).len()
    }
}
