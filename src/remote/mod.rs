//! ILIAS remote access
//!
//! Talks to the REST plugin of an ILIAS installation:
//! - learning module metadata
//! - resource link resolution
//! - streaming archive downloads

mod client;
mod download;
mod link;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::error::AppError;

pub use client::IliasRestClient;
pub use download::HttpDownloader;
pub use link::BaseUrlLinkBuilder;

/// Metadata of a zipped learning module
///
/// Every field is required; a body missing one is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningModuleData {
    /// Entry file, relative to the extracted module directory
    pub start_file: String,
    /// Archive resource to download
    pub zip_file: String,
    /// Directory the archive extracts into
    pub zip_dir_name: String,
    /// Last change of the content on the server
    pub timestamp: i64,
}

/// Source of learning module metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LearningModuleApi: Send + Sync {
    async fn learning_module_data(&self, ref_id: i64) -> Result<LearningModuleData, AppError>;
}

/// Turns a resource reference into a downloadable URL
#[cfg_attr(test, mockall::automock)]
pub trait LinkBuilder: Send + Sync {
    fn resource_url(&self, resource: &str) -> Result<Url, AppError>;
}

/// Stores the body of a URL in a local file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileDownloader: Send + Sync {
    /// Returns the number of bytes written
    async fn download(&self, url: &Url, target: &Path) -> Result<u64, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_requires_every_field() {
        let complete = serde_json::json!({
            "startFile": "index.html",
            "zipFile": "data/lm_1.zip",
            "zipDirName": "lm_1",
            "timestamp": 1_700_000_000
        });
        let data: LearningModuleData = serde_json::from_value(complete).unwrap();
        assert_eq!(data.zip_dir_name, "lm_1");

        let missing = serde_json::json!({
            "startFile": "index.html",
            "zipFile": "data/lm_1.zip",
            "timestamp": 1
        });
        assert!(serde_json::from_value::<LearningModuleData>(missing).is_err());
    }
}
