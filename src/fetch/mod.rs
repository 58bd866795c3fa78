//! Streaming HTTP downloads to a file on disk.
//!
//! No checksum verification and no retry happen here; callers that know a
//! checksum verify it, and callers that want retries wrap [`FileFetcher::fetch`]
//! in a [`RetryPolicy`](crate::retry::RetryPolicy).

use crate::config::schema::ApiConfig;
use crate::error::{Result, UpdaterError};
use futures_util::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct FileFetcher {
    client: reqwest::Client,
}

impl FileFetcher {
    /// Create a fetcher with the configured timeouts and user agent
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| UpdaterError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// The body is written to a sibling `.part` file and renamed into place, so a
    /// failed transfer never leaves a truncated file at `dest`.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let failed = |reason: String| UpdaterError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| failed(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = part_path(dest);
        let written = match write_body(response, &part).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(match e {
                    BodyError::Transfer(e) => failed(e.to_string()),
                    BodyError::Io(e) => UpdaterError::Io(e),
                });
            }
        };

        tokio::fs::rename(&part, dest).await?;
        tracing::debug!("Fetched {url} ({written} bytes) to {}", dest.display());
        Ok(written)
    }
}

enum BodyError {
    Transfer(reqwest::Error),
    Io(std::io::Error),
}

async fn write_body(response: reqwest::Response, path: &Path) -> std::result::Result<u64, BodyError> {
    let mut file = tokio::fs::File::create(path).await.map_err(BodyError::Io)?;
    let mut written: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyError::Transfer)?;
        file.write_all(&chunk).await.map_err(BodyError::Io)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(BodyError::Io)?;
    Ok(written)
}

fn part_path(dest: &Path) -> std::path::PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
