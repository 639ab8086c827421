//! Data models
//!
//! Plain Rust structs representing database rows.
//! Persistence lives in the repositories, not on the models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// Object types
// =============================================================================

pub const TYPE_COURSE: &str = "crs";
pub const TYPE_GROUP: &str = "grp";
pub const TYPE_FOLDER: &str = "fold";
pub const TYPE_FILE: &str = "file";
pub const TYPE_LEARNPLACE: &str = "xsrl";
pub const TYPE_HTML_LEARNING_MODULE: &str = "htlm";

/// Objects of unknown type sort after everything else
const LAST_PLACE: u32 = 9999;

// =============================================================================
// Favorite status
// =============================================================================

/// Favorite marker of a remote object
///
/// Stored as an integer so `> 0` means "marked, downloaded or not".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum FavoriteStatus {
    #[default]
    None = 0,
    Downloaded = 1,
    Pending = 2,
}

impl FavoriteStatus {
    pub fn is_favorite(self) -> bool {
        self != FavoriteStatus::None
    }
}

// =============================================================================
// Remote object
// =============================================================================

/// A node of the remote repository tree, cached locally per user
///
/// `id` is `None` until the row has been inserted. Lookups by key
/// return such an unsaved instance when nothing matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RemoteObject {
    pub id: Option<i64>,
    /// Local user owning this row
    pub user_id: i64,
    /// ILIAS object id
    pub obj_id: i64,
    /// ILIAS reference id
    pub ref_id: i64,
    /// Reference id of the parent in the tree
    pub parent_ref_id: i64,
    /// ILIAS type tag (crs, grp, fold, file, ...)
    pub object_type: String,
    pub title: String,
    pub description: String,
    /// Static link to the object in ILIAS
    pub link: String,
    pub is_offline_available: bool,
    #[sqlx(rename = "is_favorite")]
    pub favorite: FavoriteStatus,
    /// Additional resources must be fetched before the object is usable offline
    pub needs_download: bool,
    /// Auxiliary JSON payload
    pub data: Option<String>,
    /// Repository path as JSON array of titles
    pub repo_path: Option<String>,
    pub has_page_layout: bool,
    pub has_timeline: bool,
    pub permission_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteObject {
    /// Fresh, unsaved object owned by `user_id`
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            user_id,
            obj_id: 0,
            ref_id: 0,
            parent_ref_id: 0,
            object_type: String::new(),
            title: String::new(),
            description: String::new(),
            link: String::new(),
            is_offline_available: false,
            favorite: FavoriteStatus::None,
            needs_download: false,
            data: None,
            repo_path: None,
            has_page_layout: false,
            has_timeline: false,
            permission_type: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self.object_type.as_str(),
            TYPE_COURSE | TYPE_GROUP | TYPE_FOLDER
        )
    }

    pub fn is_file(&self) -> bool {
        self.object_type == TYPE_FILE
    }

    pub fn is_learnplace(&self) -> bool {
        self.object_type == TYPE_LEARNPLACE
    }

    /// Only visible, not readable: the object can be linked but not opened
    pub fn is_linked(&self) -> bool {
        self.permission_type == "visible"
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite.is_favorite()
    }

    /// Auxiliary payload, `{}` when absent or malformed
    pub fn data_json(&self) -> serde_json::Value {
        self.data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()))
    }

    pub fn set_data_json(&mut self, value: &serde_json::Value) {
        self.data = Some(value.to_string());
    }

    /// Repository path segments, empty when absent or malformed
    pub fn repo_path_segments(&self) -> Vec<String> {
        let Some(raw) = self.repo_path.as_deref() else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(segments) => segments,
            Err(error) => {
                tracing::error!(%error, repo_path = %raw, "Could not parse repository path");
                Vec::new()
            }
        }
    }

    pub fn set_repo_path_segments(&mut self, segments: &[String]) {
        self.repo_path = serde_json::to_string(segments).ok();
    }

    /// crs=1, grp=2, fold=3, file=4, everything else last
    pub fn type_rank(&self) -> u32 {
        match self.object_type.as_str() {
            TYPE_COURSE => 1,
            TYPE_GROUP => 2,
            TYPE_FOLDER => 3,
            TYPE_FILE => 4,
            _ => LAST_PLACE,
        }
    }

    /// Ordering used for object lists: type rank, type tag, then title
    pub fn listing_order(a: &RemoteObject, b: &RemoteObject) -> Ordering {
        a.type_rank()
            .cmp(&b.type_rank())
            .then_with(|| a.object_type.cmp(&b.object_type))
            .then_with(|| a.title.cmp(&b.title))
    }
}

// =============================================================================
// File data
// =============================================================================

/// Download state of a file object
///
/// Keyed by the surrogate id of the owning `RemoteObject`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileData {
    pub object_id: i64,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    /// Version date of the file on the server
    pub file_version_date: DateTime<Utc>,
    /// Version date of the downloaded copy, if any
    pub file_version_date_local: Option<DateTime<Utc>>,
}

impl FileData {
    /// No local copy, or the local copy is older than the remote file
    pub fn needs_download(&self) -> bool {
        match self.file_version_date_local {
            Some(local) => local < self.file_version_date,
            None => true,
        }
    }
}

// =============================================================================
// Learning module
// =============================================================================

/// Locally stored HTML learning module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LearningModule {
    pub id: Option<i64>,
    pub obj_id: i64,
    pub user_id: i64,
    /// Entry file, relative to the module directory
    pub relative_start_file: String,
    /// Remote content timestamp of the stored copy
    pub timestamp: i64,
}

impl LearningModule {
    /// Fresh, unsaved record for `(obj_id, user_id)`
    pub fn new(obj_id: i64, user_id: i64) -> Self {
        Self {
            id: None,
            obj_id,
            user_id,
            relative_start_file: String::new(),
            timestamp: 0,
        }
    }
}
