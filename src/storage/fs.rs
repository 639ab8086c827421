//! Local filesystem implementation of [`FileStorage`]

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;

use super::FileStorage;
use crate::error::AppError;

/// `FileStorage` backed by `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFileStorage;

impl LocalFileStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn create_dir_all(&self, dir: &Path) -> Result<(), AppError> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })
    }

    async fn move_and_replace_dir(&self, source: &Path, target: &Path) -> Result<(), AppError> {
        if !tokio::fs::try_exists(source).await? {
            return Err(AppError::Storage(format!(
                "Cannot move missing directory {}",
                source.display()
            )));
        }

        self.remove_dir_if_exists(target).await?;
        if let Some(parent) = target.parent() {
            self.create_dir_all(parent).await?;
        }

        tokio::fs::rename(source, target).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to move {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;

        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            "Moved directory"
        );
        Ok(())
    }

    async fn remove_file_if_exists(&self, file: &Path) -> Result<bool, AppError> {
        match tokio::fs::remove_file(file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to remove {}: {}",
                file.display(),
                e
            ))),
        }
    }

    async fn remove_dir_if_exists(&self, dir: &Path) -> Result<bool, AppError> {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }
}
