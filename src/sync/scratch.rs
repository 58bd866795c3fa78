use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary working area for one run.
///
/// Holds the downloaded archive, its extraction and the old-mods snapshot. The
/// directory is removed when the value is dropped, on success, error and
/// cancellation alike.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Create the scratch directory under `parent`, or the system temp dir
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("modpack-update-");

        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!("Scratch area at {}", dir.path().display());

        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.path().join("modpack.zip")
    }

    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.path().join("extract")
    }

    #[must_use]
    pub fn old_mods_dir(&self) -> PathBuf {
        self.path().join("mods_old")
    }
}
