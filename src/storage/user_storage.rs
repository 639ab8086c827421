//! Per-user offline storage
//!
//! Owns the on-disk copies of favorites: downloaded files and installed
//! learning modules. Removing a copy also resets the bookkeeping that
//! claims it exists, so storage numbers stay honest.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FileStorage, OfflineStorage, StoragePaths};
use crate::data::{FileDataRepository, LearningModuleRepository, RemoteObject};
use crate::error::AppError;

/// Offline storage of all users below one root directory
pub struct UserStorage {
    paths: StoragePaths,
    files: Arc<dyn FileStorage>,
    learning_modules: Arc<dyn LearningModuleRepository>,
    file_data: Arc<dyn FileDataRepository>,
}

impl UserStorage {
    pub fn new(
        paths: StoragePaths,
        files: Arc<dyn FileStorage>,
        learning_modules: Arc<dyn LearningModuleRepository>,
        file_data: Arc<dyn FileDataRepository>,
    ) -> Self {
        Self {
            paths,
            files,
            learning_modules,
            file_data,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Bytes used by the offline content of `user_id`
    pub async fn used_disk_space(&self, user_id: i64) -> Result<u64, AppError> {
        directory_size(&self.paths.user_dir(user_id)).await
    }
}

#[async_trait]
impl OfflineStorage for UserStorage {
    async fn remove_object(&self, object: &RemoteObject) -> Result<(), AppError> {
        let files_dir = self.paths.object_files_dir(object.user_id, object.obj_id);
        let module_dir = self
            .paths
            .learning_module_dir(object.user_id, object.obj_id);

        let removed_files = self.files.remove_dir_if_exists(&files_dir).await?;
        let removed_module = self.files.remove_dir_if_exists(&module_dir).await?;

        if let Some(id) = object.id {
            if object.is_file() {
                self.file_data.clear_local_version(id).await?;
            }
        }
        if removed_module {
            self.learning_modules
                .delete_learning_module(object.obj_id, object.user_id)
                .await?;
        }

        tracing::debug!(
            ref_id = object.ref_id,
            obj_id = object.obj_id,
            removed_files,
            removed_module,
            "Removed offline copy"
        );
        Ok(())
    }
}

/// Sum of file sizes below `root`; a missing root counts as empty
async fn directory_size(root: &Path) -> Result<u64, AppError> {
    let mut total = 0u64;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }

    Ok(total)
}
