//! Partial result cache
//!
//! In-memory map from root-entity id to report. Entries expire a fixed
//! window after their last write; a background sweeper drops expired ones.
//! Merges are monotonic: once a field is filled it is never replaced or
//! cleared by a later store.

use super::field::Report;
use arf_common::config::MAX_CACHE_TTL_SECS;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct CacheEntry<R> {
    report: R,
    expires_at: Instant,
}

impl<R> CacheEntry<R> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct ReportCache<R: Report> {
    entries: RwLock<HashMap<String, CacheEntry<R>>>,
    ttl: Duration,
}

impl<R: Report> ReportCache<R> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expiry(&self, now: Instant) -> Instant {
        now.checked_add(self.ttl)
            .unwrap_or_else(|| now + Duration::from_secs(MAX_CACHE_TTL_SECS))
    }

    /// Unexpired report for a root entity
    pub async fn get(&self, root_id: &str) -> Option<R> {
        let entries = self.entries.read().await;
        entries
            .get(root_id)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.report.clone())
    }

    /// Fill the stored report's empty fields from `newer` and restart its TTL
    ///
    /// An expired or missing entry is replaced by a copy of `newer`.
    pub async fn merge_and_store(&self, root_id: &str, newer: &R) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(root_id) {
            Some(entry) if entry.is_live(now) => {
                entry.report.merge_from(newer);
                entry.expires_at = self.expiry(now);
                debug!(kind = R::KIND, root = %root_id, "Merged report into cache");
            }
            _ => {
                entries.insert(
                    root_id.to_string(),
                    CacheEntry {
                        report: newer.clone(),
                        expires_at: self.expiry(now),
                    },
                );
                debug!(kind = R::KIND, root = %root_id, "Stored new cache entry");
            }
        }
    }

    /// Drop expired entries, returning how many were removed
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Periodically sweep until `shutdown` fires
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            // A zero period would panic
            let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep().await;
                        if removed > 0 {
                            info!(kind = R::KIND, removed, "Swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}
