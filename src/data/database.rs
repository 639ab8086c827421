//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with embedded migrations.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use super::repository::{
    FileDataRepository, LearningModuleRepository, ObjectQuery, ObjectRepository,
};
use crate::error::AppError;
use crate::metrics::observe_db_query;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Objects
    // =========================================================================

    async fn insert_object(&self, object: &RemoteObject) -> Result<i64, AppError> {
        observe_db_query("insert", "objects");
        let result = sqlx::query(
            r#"
            INSERT INTO objects (
                user_id, obj_id, ref_id, parent_ref_id, object_type, title,
                description, link, is_offline_available, is_favorite,
                needs_download, data, repo_path, has_page_layout, has_timeline,
                permission_type, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(object.user_id)
        .bind(object.obj_id)
        .bind(object.ref_id)
        .bind(object.parent_ref_id)
        .bind(&object.object_type)
        .bind(&object.title)
        .bind(&object.description)
        .bind(&object.link)
        .bind(object.is_offline_available)
        .bind(object.favorite)
        .bind(object.needs_download)
        .bind(&object.data)
        .bind(&object.repo_path)
        .bind(object.has_page_layout)
        .bind(object.has_timeline)
        .bind(&object.permission_type)
        .bind(object.created_at)
        .bind(object.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn update_object(&self, id: i64, object: &RemoteObject) -> Result<(), AppError> {
        observe_db_query("update", "objects");
        let result = sqlx::query(
            r#"
            UPDATE objects SET
                user_id = ?, obj_id = ?, ref_id = ?, parent_ref_id = ?,
                object_type = ?, title = ?, description = ?, link = ?,
                is_offline_available = ?, is_favorite = ?, needs_download = ?,
                data = ?, repo_path = ?, has_page_layout = ?, has_timeline = ?,
                permission_type = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(object.user_id)
        .bind(object.obj_id)
        .bind(object.ref_id)
        .bind(object.parent_ref_id)
        .bind(&object.object_type)
        .bind(&object.title)
        .bind(&object.description)
        .bind(&object.link)
        .bind(object.is_offline_available)
        .bind(object.favorite)
        .bind(object.needs_download)
        .bind(&object.data)
        .bind(&object.repo_path)
        .bind(object.has_page_layout)
        .bind(object.has_timeline)
        .bind(&object.permission_type)
        .bind(object.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectRepository for Database {
    async fn find(&self, id: i64) -> Result<Option<RemoteObject>, AppError> {
        observe_db_query("select", "objects");
        let object = sqlx::query_as::<_, RemoteObject>("SELECT * FROM objects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(object)
    }

    async fn save(&self, object: &RemoteObject) -> Result<RemoteObject, AppError> {
        let mut stored = object.clone();
        stored.updated_at = Utc::now();

        match stored.id {
            Some(id) => self.update_object(id, &stored).await?,
            None => {
                stored.created_at = stored.updated_at;
                stored.id = Some(self.insert_object(&stored).await?);
            }
        }

        Ok(stored)
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        observe_db_query("delete", "objects");
        sqlx::query("DELETE FROM objects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, query: &ObjectQuery) -> Result<Vec<i64>, AppError> {
        observe_db_query("select", "objects");
        let ids = match *query {
            ObjectQuery::ByRefId { ref_id, user_id } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM objects WHERE ref_id = ? AND user_id = ? ORDER BY id ASC",
                )
                .bind(ref_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            ObjectQuery::ByObjId { obj_id, user_id } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM objects WHERE obj_id = ? AND user_id = ? ORDER BY id ASC",
                )
                .bind(obj_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            ObjectQuery::ByParentRefId {
                parent_ref_id,
                user_id,
            } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM objects WHERE parent_ref_id = ? AND user_id = ? ORDER BY id ASC",
                )
                .bind(parent_ref_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            ObjectQuery::ByUser { user_id } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM objects WHERE user_id = ? ORDER BY id ASC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            ObjectQuery::Favorites {
                user_id,
                include_pending,
            } => {
                let sql = if include_pending {
                    "SELECT id FROM objects WHERE is_favorite > 0 AND user_id = ? ORDER BY title ASC, id ASC"
                } else {
                    "SELECT id FROM objects WHERE is_favorite = 1 AND user_id = ? ORDER BY title ASC, id ASC"
                };
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            ObjectQuery::OpenDownloads { user_id } => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM objects WHERE is_favorite = ? AND user_id = ? ORDER BY id ASC",
                )
                .bind(FavoriteStatus::Pending)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(ids)
    }
}

// =============================================================================
// Learning modules
// =============================================================================

#[async_trait]
impl LearningModuleRepository for Database {
    async fn find_by_obj_id_and_user_id(
        &self,
        obj_id: i64,
        user_id: i64,
    ) -> Result<LearningModule, AppError> {
        observe_db_query("select", "learning_modules");
        let module = sqlx::query_as::<_, LearningModule>(
            "SELECT * FROM learning_modules WHERE obj_id = ? AND user_id = ?",
        )
        .bind(obj_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(module.unwrap_or_else(|| LearningModule::new(obj_id, user_id)))
    }

    async fn exists_by_obj_id_and_user_id(
        &self,
        obj_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        observe_db_query("select", "learning_modules");
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM learning_modules WHERE obj_id = ? AND user_id = ?",
        )
        .bind(obj_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn save_learning_module(
        &self,
        module: &LearningModule,
    ) -> Result<LearningModule, AppError> {
        observe_db_query("upsert", "learning_modules");
        sqlx::query(
            r#"
            INSERT INTO learning_modules (obj_id, user_id, relative_start_file, timestamp)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(obj_id, user_id) DO UPDATE SET
                relative_start_file = excluded.relative_start_file,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(module.obj_id)
        .bind(module.user_id)
        .bind(&module.relative_start_file)
        .bind(module.timestamp)
        .execute(&self.pool)
        .await?;

        self.find_by_obj_id_and_user_id(module.obj_id, module.user_id)
            .await
    }

    async fn delete_learning_module(&self, obj_id: i64, user_id: i64) -> Result<(), AppError> {
        observe_db_query("delete", "learning_modules");
        sqlx::query("DELETE FROM learning_modules WHERE obj_id = ? AND user_id = ?")
            .bind(obj_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// File data
// =============================================================================

#[async_trait]
impl FileDataRepository for Database {
    async fn find_file_data(&self, object_id: i64) -> Result<Option<FileData>, AppError> {
        observe_db_query("select", "file_data");
        let file = sqlx::query_as::<_, FileData>("SELECT * FROM file_data WHERE object_id = ?")
            .bind(object_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    async fn save_file_data(&self, file: &FileData) -> Result<(), AppError> {
        observe_db_query("upsert", "file_data");
        sqlx::query(
            r#"
            INSERT INTO file_data (
                object_id, file_name, file_size, file_type,
                file_version_date, file_version_date_local
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(object_id) DO UPDATE SET
                file_name = excluded.file_name,
                file_size = excluded.file_size,
                file_type = excluded.file_type,
                file_version_date = excluded.file_version_date,
                file_version_date_local = excluded.file_version_date_local
            "#,
        )
        .bind(file.object_id)
        .bind(&file.file_name)
        .bind(file.file_size)
        .bind(&file.file_type)
        .bind(file.file_version_date)
        .bind(file.file_version_date_local)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_local_version(&self, object_id: i64) -> Result<(), AppError> {
        observe_db_query("update", "file_data");
        sqlx::query("UPDATE file_data SET file_version_date_local = NULL WHERE object_id = ?")
            .bind(object_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
