//! Cache statistics

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::tier::FlatTier;

/// Counters describing cache effectiveness. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

enum Counter {
    Hit,
    Miss,
    Set,
    Delete,
}

/// Records counters and writes them through to the flat store on every change.
pub struct StatsRecorder {
    stats: Mutex<CacheStats>,
    flat: Arc<FlatTier>,
    key: String,
}

impl StatsRecorder {
    pub fn new(flat: Arc<FlatTier>, key: impl Into<String>) -> Self {
        Self {
            stats: Mutex::new(CacheStats::default()),
            flat,
            key: key.into(),
        }
    }

    /// Replace the in-memory counters with the persisted ones, if any.
    pub fn load(&self) {
        let Some(raw) = self.flat.read_item(&self.key) else {
            return;
        };
        match serde_json::from_str::<CacheStats>(&raw) {
            Ok(persisted) => {
                debug!("Loaded cache stats: {:?}", persisted);
                *self.lock() = persisted;
            }
            Err(e) => warn!("Ignoring unreadable persisted stats: {}", e),
        }
    }

    pub fn record_hit(&self) {
        self.bump(Counter::Hit);
    }

    pub fn record_miss(&self) {
        self.bump(Counter::Miss);
    }

    pub fn record_set(&self) {
        self.bump(Counter::Set);
    }

    pub fn record_delete(&self) {
        self.bump(Counter::Delete);
    }

    pub fn snapshot(&self) -> CacheStats {
        *self.lock()
    }

    pub fn reset(&self) {
        let mut stats = self.lock();
        *stats = CacheStats::default();
        self.persist(&stats);
    }

    fn bump(&self, counter: Counter) {
        let mut stats = self.lock();
        let slot = match counter {
            Counter::Hit => &mut stats.hits,
            Counter::Miss => &mut stats.misses,
            Counter::Set => &mut stats.sets,
            Counter::Delete => &mut stats.deletes,
        };
        *slot = slot.saturating_add(1);
        self.persist(&stats);
    }

    // Called with the lock held so persisted snapshots are written in order.
    fn persist(&self, stats: &CacheStats) {
        match serde_json::to_string(stats) {
            Ok(raw) => {
                self.flat.write_item(&self.key, raw);
            }
            Err(e) => warn!("Failed to encode cache stats: {}", e),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
