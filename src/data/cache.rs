//! In-memory object cache
//!
//! Volatile and owned by the session context; dropped or cleared when the
//! session ends. Uses Moka, which coalesces concurrent initialisations of
//! the same key: while one load for an id is in flight, every other caller
//! awaits that load instead of issuing its own.

use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::models::RemoteObject;
use crate::error::AppError;

const CACHE_NAME: &str = "objects";

/// Session-scoped cache of loaded remote objects
///
/// Failed loads are never stored, so the next lookup of the same id
/// starts a fresh load.
#[derive(Clone)]
pub struct ObjectCache {
    /// Surrogate id -> loaded object
    objects: Cache<i64, Arc<RemoteObject>>,
}

impl ObjectCache {
    /// Create new object cache
    ///
    /// # Arguments
    /// * `max_objects` - Maximum number of objects kept in memory
    /// * `ttl` - Time an entry stays valid after insertion
    pub fn new(max_objects: u64, ttl: Duration) -> Self {
        let objects = Cache::builder()
            .max_capacity(max_objects)
            .time_to_live(ttl)
            .build();

        Self { objects }
    }

    /// Cached object, if present
    pub async fn get(&self, id: i64) -> Option<Arc<RemoteObject>> {
        let result = self.objects.get(&id).await;

        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&[CACHE_NAME]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&[CACHE_NAME]).inc();
        }

        result
    }

    /// Cached object, or the result of `load`
    ///
    /// At most one `load` runs per id at a time. Callers arriving while it
    /// runs receive the same `Arc`. If it fails, every waiter gets the
    /// error and nothing is cached.
    pub async fn get_or_load<F>(&self, id: i64, load: F) -> Result<Arc<RemoteObject>, AppError>
    where
        F: Future<Output = Result<Arc<RemoteObject>, AppError>> + Send + 'static,
    {
        if let Some(object) = self.get(id).await {
            return Ok(object);
        }

        let object = self.objects.try_get_with(id, load).await?;
        self.update_size_metric();
        Ok(object)
    }

    /// Replace the cached copy after a write
    pub async fn insert(&self, object: Arc<RemoteObject>) {
        let Some(id) = object.id else {
            return;
        };
        self.objects.insert(id, object).await;
        self.update_size_metric();
    }

    /// Drop one entry
    pub async fn invalidate(&self, id: i64) {
        self.objects.invalidate(&id).await;
        self.update_size_metric();
    }

    /// Drop everything, e.g. on logout
    pub async fn clear(&self) {
        self.objects.invalidate_all();
        self.objects.run_pending_tasks().await;
        self.update_size_metric();
        tracing::debug!("Cleared object cache");
    }

    /// Number of cached objects after pending maintenance ran
    pub async fn len(&self) -> u64 {
        self.objects.run_pending_tasks().await;
        self.objects.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn update_size_metric(&self) {
        use crate::metrics::CACHE_SIZE;
        CACHE_SIZE
            .with_label_values(&[CACHE_NAME])
            .set(self.objects.entry_count() as i64);
    }
}
