//! Needs-download propagation
//!
//! A file needs a download when its local copy is missing or stale. A
//! container needs one when any direct child does. Changing a node's flag
//! can change its parent's, so updates walk upward until a node's derived
//! value already matches what is stored.

use std::sync::Arc;

use super::ObjectStore;
use crate::data::{FileDataRepository, RemoteObject};
use crate::error::AppError;

/// Keeps the derived `needs_download` flags consistent along the tree
pub struct AvailabilityService {
    store: Arc<ObjectStore>,
    files: Arc<dyn FileDataRepository>,
}

impl AvailabilityService {
    pub fn new(store: Arc<ObjectStore>, files: Arc<dyn FileDataRepository>) -> Self {
        Self { store, files }
    }

    /// Recompute the flag of `object` and escalate changes to its ancestors
    ///
    /// # Arguments
    /// * `object` - Node whose own state changed
    /// * `child_needs_download` - Value a child just changed to, if known;
    ///   `Some(true)` spares a container the look at its children
    ///
    /// # Returns
    /// Every node whose stored flag changed, lowest node first. Empty when
    /// `object` is neither a file nor a container, or when its flag was
    /// already up to date.
    pub async fn update_needs_download(
        &self,
        object: &RemoteObject,
        child_needs_download: Option<bool>,
    ) -> Result<Vec<Arc<RemoteObject>>, AppError> {
        let mut changed = Vec::new();
        let mut current = Arc::new(object.clone());
        let mut child_hint = child_needs_download;

        loop {
            tracing::debug!(
                ref_id = current.ref_id,
                title = %current.title,
                "Updating needs download"
            );

            let Some(needs_download) = self.derive(&current, child_hint).await? else {
                // Neither file nor container: no flag of its own, nothing to escalate
                break;
            };

            if needs_download == current.needs_download {
                tracing::debug!(
                    ref_id = current.ref_id,
                    needs_download,
                    "Needs download unchanged, stopping escalation"
                );
                break;
            }

            let mut updated = (*current).clone();
            updated.needs_download = needs_download;
            let saved = self.store.save(&updated).await?;
            crate::metrics::NEEDS_DOWNLOAD_UPDATES_TOTAL.inc();
            changed.push(saved.clone());

            match self.store.parent(&saved).await? {
                Some(parent) => {
                    current = parent;
                    child_hint = Some(needs_download);
                }
                None => break,
            }
        }

        Ok(changed)
    }

    /// Value the flag of `object` should have, `None` for types without one
    async fn derive(
        &self,
        object: &RemoteObject,
        child_hint: Option<bool>,
    ) -> Result<Option<bool>, AppError> {
        if object.is_file() {
            let file_data = match object.id {
                Some(id) => self.files.find_file_data(id).await?,
                None => None,
            };
            // No download record yet means nothing is stored locally
            return Ok(Some(file_data.is_none_or(|file| file.needs_download())));
        }

        if object.is_container() {
            if child_hint == Some(true) {
                return Ok(Some(true));
            }
            let children = self
                .store
                .find_by_parent_ref_id(object.ref_id, object.user_id)
                .await?;
            return Ok(Some(children.iter().any(|child| child.needs_download)));
        }

        Ok(None)
    }
}
