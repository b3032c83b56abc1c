//! Cache error types

/// Errors surfaced by the cache API.
///
/// Storage failures inside a tier never reach callers of `get`/`set`; they
/// are logged and degraded to a miss or no-op. Store availability is
/// reported by `TieredCache::init` instead.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Unknown cache policy: {0}")]
    UnknownPolicy(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the persistent stores backing the document and flat tiers.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
