//! Identifier resolution: (projectID, fileID) to download URL and checksum.
//!
//! Each lookup goes through the configured [`RetryPolicy`]. Concurrent calls for
//! the same key share one in-flight request, and a successful result is reused for
//! the rest of the run.

pub mod api;

pub use api::{AddonFile, ContentApi, CurseApi};

use crate::error::{Result, UpdaterError};
use crate::manifest::{ModKey, Resolved};
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

pub struct Resolver<A> {
    api: A,
    retry: RetryPolicy,
    slots: Mutex<HashMap<ModKey, Arc<OnceCell<Resolved>>>>,
}

impl<A: ContentApi> Resolver<A> {
    #[must_use]
    pub fn new(api: A, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Resolve a key, retrying transport failures.
    ///
    /// Fails with [`UpdaterError::UpstreamUnavailable`] once the retry budget is spent.
    pub async fn resolve(&self, key: ModKey) -> Result<Resolved> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };

        slot.get_or_try_init(|| self.fetch(key)).await.cloned()
    }

    async fn fetch(&self, key: ModKey) -> Result<Resolved> {
        let what = format!("resolve {key}");
        let file = self
            .retry
            .run(&what, |_| self.api.addon_file(key))
            .await
            .map_err(|exhausted| UpdaterError::UpstreamUnavailable {
                subject: key.to_string(),
                attempts: exhausted.attempts,
                last_error: exhausted.last_error.summary(),
            })?;

        let resolved = Resolved {
            download_url: normalize_url(&file.download_url)?,
            md5: file.md5().map(str::to_ascii_lowercase),
        };

        if resolved.md5.is_none() {
            tracing::warn!("{key}: content API listed no MD5; it will always be re-downloaded");
        }
        tracing::debug!("{key} -> {}", resolved.download_url);

        Ok(resolved)
    }
}

/// Percent-encode the path of a download URL, leaving scheme, host, query and fragment as given.
///
/// Segments are decoded before encoding so already-encoded URLs come back unchanged.
pub fn normalize_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let invalid = |reason: &str| UpdaterError::Api(format!("invalid download URL '{raw}': {reason}"));

    let authority_start = raw.find("://").ok_or_else(|| invalid("missing scheme"))? + 3;
    let path_start = raw[authority_start..]
        .find(['/', '?', '#'])
        .map_or(raw.len(), |i| authority_start + i);
    let path_end = raw[path_start..]
        .find(['?', '#'])
        .map_or(raw.len(), |i| path_start + i);

    let path = raw[path_start..path_end]
        .split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map_or_else(|_| segment.to_string(), std::borrow::Cow::into_owned);
            urlencoding::encode(&decoded).into_owned()
        })
        .collect::<Vec<_>>()
        .join("/");

    let normalized = format!("{}{path}{}", &raw[..path_start], &raw[path_end..]);
    url::Url::parse(&normalized).map_err(|e| invalid(&e.to_string()))?;

    Ok(normalized)
}

/// File name a mod is stored under: the decoded last path segment of its URL
pub fn file_name_from_url(download_url: &str) -> Result<String> {
    let parsed = url::Url::parse(download_url)
        .map_err(|e| UpdaterError::Validation(format!("bad download URL '{download_url}': {e}")))?;

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let name = urlencoding::decode(segment)
        .map_err(|e| UpdaterError::Validation(format!("bad file name in '{download_url}': {e}")))?
        .into_owned();

    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(UpdaterError::Validation(format!(
            "'{download_url}' does not end in a usable file name"
        )));
    }

    Ok(name)
}
