//! Repository traits
//!
//! Entities are plain structs; these traits are the only way they reach
//! persistent storage. `Database` implements all of them against SQLite.

use async_trait::async_trait;

use super::models::{FileData, LearningModule, RemoteObject};
use crate::error::AppError;

/// Predicates understood by [`ObjectRepository::query`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectQuery {
    ByRefId { ref_id: i64, user_id: i64 },
    ByObjId { obj_id: i64, user_id: i64 },
    ByParentRefId { parent_ref_id: i64, user_id: i64 },
    ByUser { user_id: i64 },
    /// Ordered by title
    Favorites { user_id: i64, include_pending: bool },
    /// Favorites still waiting for their download
    OpenDownloads { user_id: i64 },
}

/// Storage of remote tree nodes
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// Load one row by surrogate id
    async fn find(&self, id: i64) -> Result<Option<RemoteObject>, AppError>;

    /// Insert (when `id` is `None`) or update; returns the stored row
    async fn save(&self, object: &RemoteObject) -> Result<RemoteObject, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    /// Ids of matching rows, ascending unless the predicate defines an order
    async fn query(&self, query: &ObjectQuery) -> Result<Vec<i64>, AppError>;
}

/// Storage of learning module records
#[async_trait]
pub trait LearningModuleRepository: Send + Sync {
    /// Stored record or a fresh unsaved one carrying the keys
    async fn find_by_obj_id_and_user_id(
        &self,
        obj_id: i64,
        user_id: i64,
    ) -> Result<LearningModule, AppError>;

    async fn exists_by_obj_id_and_user_id(&self, obj_id: i64, user_id: i64)
    -> Result<bool, AppError>;

    async fn save_learning_module(&self, module: &LearningModule)
    -> Result<LearningModule, AppError>;

    async fn delete_learning_module(&self, obj_id: i64, user_id: i64) -> Result<(), AppError>;
}

/// Storage of file download state
#[async_trait]
pub trait FileDataRepository: Send + Sync {
    async fn find_file_data(&self, object_id: i64) -> Result<Option<FileData>, AppError>;

    async fn save_file_data(&self, file: &FileData) -> Result<(), AppError>;

    /// Forget the local copy so the file counts as not downloaded
    async fn clear_local_version(&self, object_id: i64) -> Result<(), AppError>;
}
