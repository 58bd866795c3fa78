use crate::config::schema::ApiConfig;
use crate::error::{Result, UpdaterError};
use crate::manifest::ModKey;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

/// Hash algorithm code the content API uses for MD5
pub const MD5_ALGORITHM: u32 = 2;

/// Per-file record returned by the content API
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddonFile {
    pub download_url: String,
    #[serde(default)]
    pub hashes: Vec<FileHash>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FileHash {
    #[serde(alias = "algo")]
    pub algorithm: u32,
    pub value: String,
}

impl AddonFile {
    /// The MD5 entry among the file's hashes, if the API listed one
    #[must_use]
    pub fn md5(&self) -> Option<&str> {
        self.hashes
            .iter()
            .find(|h| h.algorithm == MD5_ALGORITHM)
            .map(|h| h.value.as_str())
    }
}

/// Lookup of a (project, file) pair against the content API
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetch the file record. One call is one attempt; retries live in the resolver.
    async fn addon_file(&self, key: ModKey) -> Result<AddonFile>;
}

/// HTTP client for the `addon/{project}/file/{file}` endpoint
pub struct CurseApi {
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for CurseApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurseApi")
            .field("client", &"Client { ... }")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CurseApi {
    /// Create new API client from config
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| UpdaterError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, &config.base_url))
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn file_url(&self, key: ModKey) -> String {
        format!(
            "{}/api/v2/addon/{}/file/{}",
            self.base_url, key.project_id, key.file_id
        )
    }
}

#[async_trait]
impl ContentApi for CurseApi {
    async fn addon_file(&self, key: ModKey) -> Result<AddonFile> {
        let url = self.file_url(key);
        tracing::debug!("Requesting {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UpdaterError::Api(format!("{url}: {e}")))?;

        match response.status() {
            StatusCode::OK => response
                .json::<AddonFile>()
                .await
                .map_err(|e| UpdaterError::Api(format!("Failed to parse response from {url}: {e}"))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(UpdaterError::Api(format!(
                    "{url}: HTTP {status} {}",
                    body.chars().take(200).collect::<String>()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_selected_by_algorithm() {
        let file: AddonFile = serde_json::from_str(
            r#"{
                "downloadUrl": "https://edge.example/files/1/2/a.jar",
                "hashes": [
                    {"algorithm": 1, "value": "sha1sha1"},
                    {"algorithm": 2, "value": "md5md5"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(file.md5(), Some("md5md5"));
    }

    #[test]
    fn test_md5_absent() {
        let file: AddonFile =
            serde_json::from_str(r#"{"downloadUrl": "https://edge.example/a.jar"}"#).unwrap();
        assert!(file.md5().is_none());

        let file: AddonFile = serde_json::from_str(
            r#"{"downloadUrl": "https://edge.example/a.jar", "hashes": [{"algo": 1, "value": "x"}]}"#,
        )
        .unwrap();
        assert!(file.md5().is_none());
    }

    #[test]
    fn test_file_url() {
        let api = CurseApi::with_client(reqwest::Client::new(), "https://api.example/");
        assert_eq!(
            api.file_url(ModKey::new(238_222, 2_988_823)),
            "https://api.example/api/v2/addon/238222/file/2988823"
        );
    }
}
