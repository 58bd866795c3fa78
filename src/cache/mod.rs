//! Local store of previously fetched mod files.
//!
//! Entries are keyed by `<projectID>_<fileID>.jar`. A name match is never enough on
//! its own: when a checksum is recorded for the mod, the entry's bytes must hash to it.

use crate::checksum::{checksum_of, matches};
use crate::error::Result;
use crate::manifest::ModKey;
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of reading a candidate cache file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Vec<u8>),
    Miss,
    /// Present under the expected name but with different content
    Stale { actual: String },
}

impl CacheLookup {
    #[must_use]
    pub fn into_hit(self) -> Option<Vec<u8>> {
        match self {
            Self::Hit(bytes) => Some(bytes),
            Self::Miss | Self::Stale { .. } => None,
        }
    }
}

/// Read `path` and check it against `expected` (when known)
pub async fn verified_read(path: &Path, expected: Option<&str>) -> Result<CacheLookup> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CacheLookup::Miss),
        Err(e) => return Err(e.into()),
    };

    match expected {
        None => Ok(CacheLookup::Hit(bytes)),
        Some(expected) => {
            let actual = checksum_of(&bytes);
            if matches(&actual, expected) {
                Ok(CacheLookup::Hit(bytes))
            } else {
                Ok(CacheLookup::Stale { actual })
            }
        }
    }
}

/// Content-addressed (by [`ModKey`]) mod file store
#[derive(Debug, Clone)]
pub struct ModCache {
    root: PathBuf,
}

impl ModCache {
    /// Open (creating if needed) a cache rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn entry_path(&self, key: ModKey) -> PathBuf {
        self.root
            .join(format!("{}_{}.jar", key.project_id, key.file_id))
    }

    /// Raw lookup, reporting stale entries to the caller
    pub async fn inspect(&self, key: ModKey, expected: Option<&str>) -> Result<CacheLookup> {
        verified_read(&self.entry_path(key), expected).await
    }

    /// Cached bytes for `key`, or `None` on a miss or checksum mismatch
    pub async fn lookup(&self, key: ModKey, expected: Option<&str>) -> Result<Option<Vec<u8>>> {
        let lookup = self.inspect(key, expected).await?;
        if let CacheLookup::Stale { actual } = &lookup {
            tracing::warn!(
                "Cached {key} has checksum {actual}, expected {}; ignoring it",
                expected.unwrap_or_default()
            );
        }
        Ok(lookup.into_hit())
    }

    /// Store bytes for `key` (tmp + rename)
    pub async fn store(&self, key: ModKey, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.entry_path(key);
        let tmp_path = path.with_extension("jar.tmp");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(path)
    }
}
