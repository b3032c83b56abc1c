//! commcache - Tiered caching library for CommuniConnect
//!
//! This library caches application resources (users, publications, events,
//! analytics, ...) in one of three storage tiers chosen per resource type:
//! - Memory: per-domain LRU maps (fastest, lost on restart)
//! - Document store: persistent, one namespace per domain (Redis or filesystem)
//! - Flat store: persistent string key-value file
//!
//! The cache supports:
//! - Static per-domain TTL, tier and capacity policies
//! - Lazy expiry on read plus a periodic background sweep
//! - Read-through queries with per-key request coalescing
//! - Persisted hit/miss/set/delete statistics
//! - Silent degradation when a persistent store is unavailable

pub mod clock;
mod config;
mod entry;
mod error;
mod key;
mod policy;
mod single_flight;
mod stats;
pub mod store;
mod sweeper;
pub mod tier;
mod tiered_cache;

pub use config::{CacheConfig, DEFAULT_STATS_KEY};
pub use entry::CacheEntry;
pub use error::{CacheError, StorageError};
pub use key::{KeyParams, build_key, build_key_named};
pub use policy::{CacheDomain, CachePolicy, TierKind};
pub use stats::CacheStats;
pub use sweeper::{SweepReport, SweeperHandle};
pub use tiered_cache::{InitReport, TieredCache};

// Re-export async_trait for store implementors
pub use async_trait::async_trait;
