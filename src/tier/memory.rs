use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::{
    ops::compute::{CompResult, Op},
    policy::EvictionPolicy,
    sync::Cache,
};
use std::collections::HashMap;

use super::Tier;
use crate::{CacheDomain, CacheEntry, TierKind};

/// In-process tier with one bounded LRU map per domain.
///
/// Each map holds at most the domain's `max_entries`. Reads count as
/// accesses, so the entries evicted on overflow are the least recently
/// read or written ones of that domain only.
pub struct MemoryTier {
    maps: HashMap<CacheDomain, Cache<String, CacheEntry>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        let maps = CacheDomain::ALL
            .into_iter()
            .map(|domain| {
                let map = Cache::builder()
                    .max_capacity(domain.policy().max_entries)
                    .eviction_policy(EvictionPolicy::lru())
                    .build();
                (domain, map)
            })
            .collect();
        Self { maps }
    }

    fn map(&self, domain: CacheDomain) -> Option<&Cache<String, CacheEntry>> {
        self.maps.get(&domain)
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn get(&self, domain: CacheDomain, key: &str) -> Option<CacheEntry> {
        self.map(domain)?.get(key)
    }

    async fn set(&self, domain: CacheDomain, entry: CacheEntry) -> bool {
        let Some(map) = self.map(domain) else {
            return false;
        };
        map.insert(entry.key().to_owned(), entry);
        // Apply eviction now so the bound holds once `set` returns.
        map.run_pending_tasks();
        true
    }

    async fn delete(&self, domain: CacheDomain, key: &str) {
        if let Some(map) = self.map(domain) {
            map.invalidate(key);
        }
    }

    async fn delete_if_expired(
        &self,
        domain: CacheDomain,
        key: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(map) = self.map(domain) else {
            return false;
        };
        let result = map.entry_by_ref(key).and_compute_with(|current| match current {
            Some(entry) if entry.value().is_expired(now) => Op::Remove,
            _ => Op::Nop,
        });
        matches!(result, CompResult::Removed(_))
    }

    async fn scan_all(&self, domain: CacheDomain) -> Vec<CacheEntry> {
        self.map(domain)
            .map(|map| map.iter().map(|(_, entry)| entry).collect())
            .unwrap_or_default()
    }

    async fn clear(&self, domain: CacheDomain) {
        if let Some(map) = self.map(domain) {
            map.invalidate_all();
            map.run_pending_tasks();
        }
    }

    async fn len(&self, domain: CacheDomain) -> usize {
        self.map(domain).map_or(0, |map| {
            map.run_pending_tasks();
            usize::try_from(map.entry_count()).unwrap_or(usize::MAX)
        })
    }
}
