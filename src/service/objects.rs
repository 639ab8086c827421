//! Object store
//!
//! Loads remote tree nodes through the session cache and keeps the cache
//! in step with every write. Also hosts the tree walks that only need
//! objects: parents chain, recursive descendants, favorite removal.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::data::{FavoriteStatus, ObjectCache, ObjectQuery, ObjectRepository, RemoteObject};
use crate::error::AppError;
use crate::storage::OfflineStorage;

/// Cached access to the remote objects of all users
pub struct ObjectStore {
    repo: Arc<dyn ObjectRepository>,
    cache: ObjectCache,
}

impl ObjectStore {
    /// Create new object store
    ///
    /// # Arguments
    /// * `repo` - Persistent storage of objects
    /// * `cache` - Session cache; cleared by [`ObjectStore::clear_cache`]
    pub fn new(repo: Arc<dyn ObjectRepository>, cache: ObjectCache) -> Self {
        Self { repo, cache }
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load one object by surrogate id
    ///
    /// Returns the cached instance, joins a load already in flight for
    /// `id`, or starts one. Concurrent callers receive the same `Arc`.
    ///
    /// # Errors
    /// `NotFound` (possibly wrapped in `Shared`) if no row has this id
    pub async fn find(&self, id: i64) -> Result<Arc<RemoteObject>, AppError> {
        let repo = self.repo.clone();
        self.cache
            .get_or_load(id, async move {
                let object = repo.find(id).await?.ok_or(AppError::NotFound)?;
                tracing::trace!(id, ref_id = object.ref_id, "Loaded object");
                Ok(Arc::new(object))
            })
            .await
    }

    async fn find_all(&self, ids: Vec<i64>) -> Result<Vec<Arc<RemoteObject>>, AppError> {
        try_join_all(ids.into_iter().map(|id| self.find(id))).await
    }

    /// Object matching `query`, pruning duplicate rows
    ///
    /// The row with the lowest id survives; every other match is deleted.
    async fn find_unique(&self, query: ObjectQuery) -> Result<Option<Arc<RemoteObject>>, AppError> {
        let ids = self.repo.query(&query).await?;
        let Some((&keep, duplicates)) = ids.split_first() else {
            return Ok(None);
        };

        if !duplicates.is_empty() {
            tracing::warn!(
                ?query,
                keep,
                pruned = duplicates.len(),
                "Pruning duplicate object rows"
            );
            for &duplicate in duplicates {
                self.repo.delete(duplicate).await?;
                self.cache.invalidate(duplicate).await;
            }
            crate::metrics::DUPLICATES_PRUNED_TOTAL.inc_by(duplicates.len() as u64);
        }

        self.find(keep).await.map(Some)
    }

    /// Object with this reference id, or a fresh unsaved one carrying the keys
    pub async fn find_by_ref_id_and_user_id(
        &self,
        ref_id: i64,
        user_id: i64,
    ) -> Result<Arc<RemoteObject>, AppError> {
        let found = self
            .find_unique(ObjectQuery::ByRefId { ref_id, user_id })
            .await?;

        Ok(found.unwrap_or_else(|| {
            let mut object = RemoteObject::new(user_id);
            object.ref_id = ref_id;
            Arc::new(object)
        }))
    }

    /// Object with this object id, or a fresh unsaved one carrying the keys
    pub async fn find_by_obj_id_and_user_id(
        &self,
        obj_id: i64,
        user_id: i64,
    ) -> Result<Arc<RemoteObject>, AppError> {
        let found = self
            .find_unique(ObjectQuery::ByObjId { obj_id, user_id })
            .await?;

        Ok(found.unwrap_or_else(|| {
            let mut object = RemoteObject::new(user_id);
            object.obj_id = obj_id;
            Arc::new(object)
        }))
    }

    /// Direct children of a node
    pub async fn find_by_parent_ref_id(
        &self,
        parent_ref_id: i64,
        user_id: i64,
    ) -> Result<Vec<Arc<RemoteObject>>, AppError> {
        let ids = self
            .repo
            .query(&ObjectQuery::ByParentRefId {
                parent_ref_id,
                user_id,
            })
            .await?;
        self.find_all(ids).await
    }

    /// All descendants of a node
    ///
    /// Each level lists a node's children before the subtrees of those
    /// children.
    pub async fn find_by_parent_ref_id_recursive(
        &self,
        parent_ref_id: i64,
        user_id: i64,
    ) -> Result<Vec<Arc<RemoteObject>>, AppError> {
        let mut descendants = Vec::new();
        let mut visited = HashSet::from([parent_ref_id]);
        let mut pending = vec![parent_ref_id];

        while let Some(ref_id) = pending.pop() {
            let children = self.find_by_parent_ref_id(ref_id, user_id).await?;
            // Reversed so the first child's subtree is expanded next.
            // A row pointing at one of its own ancestors is skipped.
            pending.extend(
                children
                    .iter()
                    .rev()
                    .map(|child| child.ref_id)
                    .filter(|child_ref_id| visited.insert(*child_ref_id)),
            );
            descendants.extend(children);
        }

        Ok(descendants)
    }

    pub async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Arc<RemoteObject>>, AppError> {
        let ids = self.repo.query(&ObjectQuery::ByUser { user_id }).await?;
        self.find_all(ids).await
    }

    /// Favorites ordered by title
    ///
    /// With `include_pending` this also lists favorites whose download has
    /// not finished yet.
    pub async fn favorites_by_user_id(
        &self,
        user_id: i64,
        include_pending: bool,
    ) -> Result<Vec<Arc<RemoteObject>>, AppError> {
        let ids = self
            .repo
            .query(&ObjectQuery::Favorites {
                user_id,
                include_pending,
            })
            .await?;
        self.find_all(ids).await
    }

    /// Favorites still waiting for their download
    pub async fn open_downloads(&self, user_id: i64) -> Result<Vec<Arc<RemoteObject>>, AppError> {
        let ids = self
            .repo
            .query(&ObjectQuery::OpenDownloads { user_id })
            .await?;
        self.find_all(ids).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist `object` and refresh its cache entry
    pub async fn save(&self, object: &RemoteObject) -> Result<Arc<RemoteObject>, AppError> {
        let stored = Arc::new(self.repo.save(object).await?);
        self.cache.insert(stored.clone()).await;
        Ok(stored)
    }

    /// Delete `object`; unsaved objects are ignored
    pub async fn destroy(&self, object: &RemoteObject) -> Result<(), AppError> {
        let Some(id) = object.id else {
            return Ok(());
        };
        self.repo.delete(id).await?;
        self.cache.invalidate(id).await;
        tracing::debug!(id, ref_id = object.ref_id, "Deleted object");
        Ok(())
    }

    pub async fn set_is_favorite(
        &self,
        object: &RemoteObject,
        favorite: FavoriteStatus,
    ) -> Result<Arc<RemoteObject>, AppError> {
        let mut updated = object.clone();
        updated.favorite = favorite;
        self.save(&updated).await
    }

    /// Set the offline flag of `object` and all its descendants
    pub async fn set_offline_available_recursive(
        &self,
        object: &RemoteObject,
        value: bool,
    ) -> Result<(), AppError> {
        let descendants = self
            .find_by_parent_ref_id_recursive(object.ref_id, object.user_id)
            .await?;

        for entry in descendants.iter().map(|d| d.as_ref()).chain([object]) {
            let mut updated = entry.clone();
            updated.is_offline_available = value;
            self.save(&updated).await?;
        }

        tracing::debug!(
            ref_id = object.ref_id,
            value,
            updated = descendants.len() + 1,
            "Updated offline availability"
        );
        Ok(())
    }

    /// End of session: forget every cached object
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    // =========================================================================
    // Tree walks
    // =========================================================================

    /// Parent node, `None` at the root
    pub async fn parent(&self, object: &RemoteObject) -> Result<Option<Arc<RemoteObject>>, AppError> {
        let parent = self
            .find_by_ref_id_and_user_id(object.parent_ref_id, object.user_id)
            .await?;
        Ok(parent.is_saved().then_some(parent))
    }

    /// Path from the root down to `object`, both included
    pub async fn parents_chain(
        &self,
        object: &RemoteObject,
    ) -> Result<Vec<Arc<RemoteObject>>, AppError> {
        let mut chain = vec![Arc::new(object.clone())];
        let mut seen: HashSet<i64> = HashSet::from([object.ref_id]);

        let mut current = chain[0].clone();
        while let Some(parent) = self.parent(&current).await? {
            if !seen.insert(parent.ref_id) {
                tracing::warn!(ref_id = parent.ref_id, "Cycle in object tree");
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }

        chain.reverse();
        Ok(chain)
    }

    /// Topmost container above `object`, or `object` itself at the root
    pub async fn root_parent(&self, object: &RemoteObject) -> Result<Arc<RemoteObject>, AppError> {
        let chain = self.parents_chain(object).await?;
        chain.into_iter().next().ok_or(AppError::NotFound)
    }

    pub async fn parents_title_chain(&self, object: &RemoteObject) -> Result<Vec<String>, AppError> {
        let chain = self.parents_chain(object).await?;
        Ok(chain.iter().map(|o| o.title.clone()).collect())
    }

    /// Whether `object` or one of its ancestors is a favorite
    pub async fn is_under_favorite(&self, object: &RemoteObject) -> Result<bool, AppError> {
        let chain = self.parents_chain(object).await?;
        Ok(chain.iter().any(|o| o.is_favorite()))
    }

    /// Offline available only because an ancestor is a favorite
    pub async fn is_cache(&self, object: &RemoteObject) -> Result<bool, AppError> {
        if !object.is_offline_available {
            return Ok(false);
        }
        Ok(!object.is_favorite() && self.is_under_favorite(object).await?)
    }

    /// Unmark a favorite and drop the offline copies it was holding
    ///
    /// Nothing is removed if the object still sits below another favorite.
    /// Otherwise every descendant that is not a favorite of its own loses
    /// its stored copy, and so does the object itself.
    ///
    /// # Errors
    /// Storage errors abort the walk unless `ignore_deletion_errors` is set
    pub async fn remove_from_favorites(
        &self,
        object: &RemoteObject,
        storage: &dyn OfflineStorage,
        ignore_deletion_errors: bool,
    ) -> Result<(), AppError> {
        use crate::metrics::STORAGE_REMOVALS_TOTAL;

        let object = self.set_is_favorite(object, FavoriteStatus::None).await?;
        let mut stack = if self.is_under_favorite(&object).await? {
            tracing::debug!(ref_id = object.ref_id, "Still under a favorite, keeping storage");
            Vec::new()
        } else {
            vec![object.clone()]
        };

        let mut visited = HashSet::from([object.ref_id]);
        while let Some(node) = stack.pop() {
            let children = self
                .find_by_parent_ref_id(node.ref_id, object.user_id)
                .await?;
            for child in children {
                if child.is_favorite() {
                    continue;
                }
                if !visited.insert(child.ref_id) {
                    tracing::warn!(ref_id = child.ref_id, "Cycle in object tree");
                    continue;
                }
                stack.push(child);
            }

            match storage.remove_object(&node).await {
                Ok(()) => STORAGE_REMOVALS_TOTAL.with_label_values(&["removed"]).inc(),
                Err(e) if ignore_deletion_errors => {
                    STORAGE_REMOVALS_TOTAL.with_label_values(&["ignored"]).inc();
                    tracing::warn!(ref_id = node.ref_id, error = %e, "Ignoring storage removal failure");
                }
                Err(e) => {
                    STORAGE_REMOVALS_TOTAL.with_label_values(&["failed"]).inc();
                    return Err(e.record("remove_from_favorites"));
                }
            }
        }

        Ok(())
    }
}
