use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{debug, error, warn};

use super::Tier;
use crate::{CacheDomain, CacheEntry, TierKind, store::DocumentStore};

/// Persistent tier over a [`DocumentStore`], one namespace per domain.
///
/// Until [`DocumentTier::open`] succeeds the tier behaves as permanently
/// empty and drops every write.
pub struct DocumentTier {
    store: Arc<dyn DocumentStore>,
    available: AtomicBool,
}

impl DocumentTier {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            available: AtomicBool::new(false),
        }
    }

    /// Open every domain namespace. Returns whether the store is usable.
    pub async fn open(&self) -> bool {
        let namespaces: Vec<&str> = CacheDomain::ALL.iter().map(|d| d.as_str()).collect();
        match self.store.open(&namespaces).await {
            Ok(()) => {
                debug!("Document tier ready");
                self.available.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                error!("Document store unavailable, tier disabled: {}", e);
                self.available.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

fn decode(domain: CacheDomain, key: &str, doc: serde_json::Value) -> Option<CacheEntry> {
    match serde_json::from_value(doc) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(
                "Undecodable document {} in namespace {}: {}",
                key, domain, e
            );
            None
        }
    }
}

#[async_trait]
impl Tier for DocumentTier {
    fn kind(&self) -> TierKind {
        TierKind::DocumentStore
    }

    async fn get(&self, domain: CacheDomain, key: &str) -> Option<CacheEntry> {
        if !self.is_available() {
            return None;
        }
        match self.store.get(domain.as_str(), key).await {
            Ok(doc) => doc.and_then(|doc| decode(domain, key, doc)),
            Err(e) => {
                warn!("Document store GET error for key {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, domain: CacheDomain, entry: CacheEntry) -> bool {
        if !self.is_available() {
            return false;
        }
        let doc = match serde_json::to_value(&entry) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Failed to encode entry {}: {}", entry.key(), e);
                return false;
            }
        };
        match self.store.put(domain.as_str(), entry.key(), &doc).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Document store PUT error for key {}: {}", entry.key(), e);
                false
            }
        }
    }

    async fn delete(&self, domain: CacheDomain, key: &str) {
        if !self.is_available() {
            return;
        }
        if let Err(e) = self.store.delete(domain.as_str(), key).await {
            warn!("Document store DELETE error for key {}: {}", key, e);
        }
    }

    async fn scan_all(&self, domain: CacheDomain) -> Vec<CacheEntry> {
        if !self.is_available() {
            return Vec::new();
        }
        match self.store.all(domain.as_str()).await {
            Ok(docs) => docs
                .into_iter()
                .filter_map(|(key, doc)| decode(domain, &key, doc))
                .collect(),
            Err(e) => {
                warn!("Document store scan error in namespace {}: {}", domain, e);
                Vec::new()
            }
        }
    }

    async fn clear(&self, domain: CacheDomain) {
        if !self.is_available() {
            return;
        }
        if let Err(e) = self.store.clear(domain.as_str()).await {
            warn!("Document store clear error in namespace {}: {}", domain, e);
        }
    }
}
