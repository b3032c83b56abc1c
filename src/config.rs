//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::CacheError;

/// Flat-store key under which the stats counters are persisted.
pub const DEFAULT_STATS_KEY: &str = "commcache:stats";

/// Configuration for the tiered cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Interval between background expiry sweeps
    #[serde(rename = "sweep_interval_ms", with = "millis")]
    pub sweep_interval: Duration,
    /// Flat-store key holding the persisted stats
    pub stats_key: String,
    /// Route document-store domains to the flat store when the document
    /// store fails to open
    pub fallback_to_flat_store: bool,
    /// Coalesce concurrent misses on the same key into one fetch
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            stats_key: DEFAULT_STATS_KEY.to_owned(),
            fallback_to_flat_store: true,
            single_flight: true,
        }
    }
}

impl CacheConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(json)?)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
