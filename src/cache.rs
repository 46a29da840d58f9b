//! In-process cache for per-account dashboard aggregates.
//!
//! The sync pipeline refreshes an account's entry after every successful
//! commit. Refresh failures evict the stale entry and are logged; they never
//! fail the sync that triggered them.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use sea_orm::DatabaseConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::repositories::{DashboardAggregates, DashboardRepository};

/// LRU cache of dashboard aggregates keyed by account row id.
pub struct DashboardCache {
    repo: DashboardRepository,
    entries: Mutex<LruCache<Uuid, DashboardAggregates>>,
}

impl DashboardCache {
    pub fn new(db: DatabaseConnection, capacity: NonZeroUsize) -> Self {
        Self {
            repo: DashboardRepository::new(db),
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Recompute and store the aggregates for an account. On failure the
    /// stale entry is evicted so the next read recomputes.
    pub async fn refresh(&self, gmb_account_id: Uuid) {
        match self.repo.compute_aggregates(gmb_account_id).await {
            Ok(aggregates) => {
                debug!(%gmb_account_id, ?aggregates, "dashboard cache refreshed");
                if let Ok(mut entries) = self.entries.lock() {
                    entries.put(gmb_account_id, aggregates);
                }
            }
            Err(err) => {
                warn!(%gmb_account_id, error = %err, "dashboard cache refresh failed, evicting entry");
                if let Ok(mut entries) = self.entries.lock() {
                    entries.pop(&gmb_account_id);
                }
            }
        }
    }

    /// Read-through lookup: serve the cached entry or recompute and store.
    pub async fn get(&self, gmb_account_id: Uuid) -> Option<DashboardAggregates> {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(aggregates) = entries.get(&gmb_account_id) {
                return Some(aggregates.clone());
            }
        }

        match self.repo.compute_aggregates(gmb_account_id).await {
            Ok(aggregates) => {
                if let Ok(mut entries) = self.entries.lock() {
                    entries.put(gmb_account_id, aggregates.clone());
                }
                Some(aggregates)
            }
            Err(err) => {
                warn!(%gmb_account_id, error = %err, "dashboard aggregate computation failed");
                None
            }
        }
    }

    /// Peek at the cached entry without recomputing. Mainly for tests.
    pub fn peek(&self, gmb_account_id: Uuid) -> Option<DashboardAggregates> {
        self.entries
            .lock()
            .ok()
            .and_then(|mut entries| entries.get(&gmb_account_id).cloned())
    }
}
