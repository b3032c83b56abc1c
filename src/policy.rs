//! Cache domains and their static policies
//!
//! Every cached resource type is a [`CacheDomain`]. The policy for each
//! domain (TTL, storage tier, capacity) is fixed at compile time by
//! [`CacheDomain::policy`].

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

use crate::CacheError;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Storage tier a domain's entries live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// In-process, lost on restart, capacity bounded
    Memory,
    /// Asynchronous persistent store with one namespace per domain
    DocumentStore,
    /// Synchronous persistent string store
    FlatStore,
}

/// Per-domain caching policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub tier: TierKind,
    pub max_entries: u64,
}

/// Resource types cached by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
    Users,
    Publications,
    Events,
    Alerts,
    Messages,
    Notifications,
    Analytics,
    Reports,
    Locations,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 9] = [
        CacheDomain::Users,
        CacheDomain::Publications,
        CacheDomain::Events,
        CacheDomain::Alerts,
        CacheDomain::Messages,
        CacheDomain::Notifications,
        CacheDomain::Analytics,
        CacheDomain::Reports,
        CacheDomain::Locations,
    ];

    /// The strategy table.
    pub const fn policy(self) -> CachePolicy {
        let (ttl_secs, tier, max_entries) = match self {
            CacheDomain::Users => (10 * MINUTE, TierKind::Memory, 500),
            CacheDomain::Publications => (5 * MINUTE, TierKind::Memory, 200),
            CacheDomain::Events => (15 * MINUTE, TierKind::Memory, 200),
            CacheDomain::Alerts => (2 * MINUTE, TierKind::Memory, 100),
            CacheDomain::Messages => (MINUTE, TierKind::Memory, 300),
            CacheDomain::Notifications => (MINUTE, TierKind::FlatStore, 200),
            CacheDomain::Analytics => (HOUR, TierKind::DocumentStore, 1000),
            CacheDomain::Reports => (24 * HOUR, TierKind::DocumentStore, 100),
            CacheDomain::Locations => (24 * HOUR, TierKind::FlatStore, 50),
        };
        CachePolicy {
            ttl: Duration::from_secs(ttl_secs),
            tier,
            max_entries,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CacheDomain::Users => "users",
            CacheDomain::Publications => "publications",
            CacheDomain::Events => "events",
            CacheDomain::Alerts => "alerts",
            CacheDomain::Messages => "messages",
            CacheDomain::Notifications => "notifications",
            CacheDomain::Analytics => "analytics",
            CacheDomain::Reports => "reports",
            CacheDomain::Locations => "locations",
        }
    }

    /// Domains whose policy places them in `tier`.
    pub fn in_tier(tier: TierKind) -> impl Iterator<Item = CacheDomain> {
        Self::ALL.into_iter().filter(move |d| d.policy().tier == tier)
    }
}

impl fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheDomain {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CacheError::UnknownPolicy(s.to_owned()))
    }
}
