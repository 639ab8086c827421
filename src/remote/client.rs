//! REST client for the ILIAS REST plugin

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::{LearningModuleApi, LearningModuleData};
use crate::config::IliasConfig;
use crate::error::AppError;

/// JSON client for `<base_url>/<api_path>/v1/...`
#[derive(Clone)]
pub struct IliasRestClient {
    http_client: Arc<reqwest::Client>,
    api_url: String,
    access_token: Option<String>,
}

impl IliasRestClient {
    /// Create new REST client
    ///
    /// # Arguments
    /// * `http_client` - Shared HTTP client (timeouts and user agent set there)
    /// * `config` - Installation settings
    pub fn new(http_client: Arc<reqwest::Client>, config: &IliasConfig) -> Self {
        Self {
            http_client,
            api_url: config.api_url(),
            access_token: config.access_token.clone(),
        }
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET `path` and decode the JSON body
    ///
    /// # Errors
    /// `HttpClient` on transport failure, `Remote` on a non-success
    /// status or a body that does not match `T`
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let url = self.endpoint_url(path);

        let mut request = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "ILIAS request rejected");
            return Err(AppError::Remote(format!("GET {path} returned {status}")));
        }

        let body = response.text().await?;
        serde_json::from_str::<T>(&body).map_err(|e| {
            tracing::warn!(%url, error = %e, "Malformed ILIAS response");
            AppError::Remote(format!("GET {path} returned malformed body: {e}"))
        })
    }
}

#[async_trait]
impl LearningModuleApi for IliasRestClient {
    async fn learning_module_data(&self, ref_id: i64) -> Result<LearningModuleData, AppError> {
        self.get_json(&format!("/v1/learning-module/{ref_id}")).await
    }
}
