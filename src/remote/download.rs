//! Streaming file downloads

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::FileDownloader;
use crate::error::AppError;

/// Streams response bodies straight to disk
#[derive(Clone)]
pub struct HttpDownloader {
    http_client: Arc<reqwest::Client>,
    access_token: Option<String>,
}

impl HttpDownloader {
    pub fn new(http_client: Arc<reqwest::Client>, access_token: Option<String>) -> Self {
        Self {
            http_client,
            access_token,
        }
    }
}

#[async_trait]
impl FileDownloader for HttpDownloader {
    async fn download(&self, url: &Url, target: &Path) -> Result<u64, AppError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut request = self.http_client.get(url.clone());
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Remote(format!("download of {url} returned {status}")));
        }

        let mut file = tokio::fs::File::create(target).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        crate::metrics::BYTES_DOWNLOADED_TOTAL.inc_by(written);
        tracing::debug!(%url, target = %target.display(), bytes = written, "Download finished");

        Ok(written)
    }
}
