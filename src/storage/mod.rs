//! Offline storage module
//!
//! Handles:
//! - Per-user directory layout for offline content
//! - Directory move/replace and existence-checked deletes
//! - Removal of stored copies and disk usage accounting
//! - Archive extraction

mod archive;
mod fs;
mod paths;
mod user_storage;

use async_trait::async_trait;
use std::path::Path;

use crate::data::RemoteObject;
use crate::error::AppError;

pub use archive::ZipExtractor;
pub use fs::LocalFileStorage;
pub use paths::StoragePaths;
pub use user_storage::UserStorage;

/// Filesystem operations used by the download pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn create_dir_all(&self, dir: &Path) -> Result<(), AppError>;

    /// Move `source` to `target`, replacing whatever `target` held
    async fn move_and_replace_dir(&self, source: &Path, target: &Path) -> Result<(), AppError>;

    /// Returns whether a file was removed
    async fn remove_file_if_exists(&self, file: &Path) -> Result<bool, AppError>;

    /// Returns whether a directory was removed
    async fn remove_dir_if_exists(&self, dir: &Path) -> Result<bool, AppError>;
}

/// Removal of the offline copy of a tree node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OfflineStorage: Send + Sync {
    async fn remove_object(&self, object: &RemoteObject) -> Result<(), AppError>;
}

/// Unpacks an archive file into a directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    async fn unzip(&self, archive: &Path, target: &Path) -> Result<(), AppError>;
}
