//! Periodic removal of expired entries

use chrono::{DateTime, Utc};
use std::{sync::Weak, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::debug;

use crate::{CacheDomain, tier::Tier, tiered_cache::TieredCacheInner};

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries scanned across all tiers
    pub scanned: usize,
    /// Expired entries deleted
    pub removed: usize,
}

/// Delete every entry expired at `now` from `tiers`, in every domain.
pub(crate) async fn sweep(tiers: &[&dyn Tier], now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();
    for tier in tiers {
        for domain in CacheDomain::ALL {
            let entries = tier.scan_all(domain).await;
            report.scanned += entries.len();
            // Re-checked on delete: the entry may have been replaced since the scan.
            for entry in entries.iter().filter(|e| e.is_expired(now)) {
                if tier.delete_if_expired(domain, entry.key(), now).await {
                    report.removed += 1;
                }
            }
        }
    }
    if report.removed > 0 {
        debug!(
            "Expiry sweep removed {} of {} entries",
            report.removed, report.scanned
        );
    }
    report
}

/// Handle to the background sweep task. Dropping it stops the task.
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the background sweep.
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub(crate) fn spawn(cache: Weak<TieredCacheInner>, every: Duration) -> SweeperHandle {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping expiry sweeper");
                return;
            };
            cache.sweep_expired().await;
        }
    });
    SweeperHandle { handle }
}
