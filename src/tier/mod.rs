//! Storage tiers
//!
//! A tier holds [`CacheEntry`] values for every domain routed to it, each
//! domain in its own namespace. Tiers never fail: storage errors are logged
//! and turned into a miss (`get`), a dropped write (`set` returns `false`)
//! or a no-op.

mod document;
mod flat;
mod memory;

pub use document::DocumentTier;
pub use flat::FlatTier;
pub use memory::MemoryTier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{CacheDomain, CacheEntry, TierKind};

#[async_trait]
pub trait Tier: Send + Sync + 'static {
    fn kind(&self) -> TierKind;

    /// The stored entry, expired or not.
    async fn get(&self, domain: CacheDomain, key: &str) -> Option<CacheEntry>;

    /// Store `entry`, replacing any entry with the same key. Returns whether
    /// the write was kept.
    async fn set(&self, domain: CacheDomain, entry: CacheEntry) -> bool;

    async fn delete(&self, domain: CacheDomain, key: &str);

    /// Delete the entry under `key` only if the stored entry is expired at
    /// `now`. Returns whether an entry was removed.
    async fn delete_if_expired(
        &self,
        domain: CacheDomain,
        key: &str,
        now: DateTime<Utc>,
    ) -> bool {
        match self.get(domain, key).await {
            Some(entry) if entry.is_expired(now) => {
                self.delete(domain, key).await;
                true
            }
            _ => false,
        }
    }

    async fn scan_all(&self, domain: CacheDomain) -> Vec<CacheEntry>;

    async fn clear(&self, domain: CacheDomain);

    async fn len(&self, domain: CacheDomain) -> usize {
        self.scan_all(domain).await.len()
    }
}
