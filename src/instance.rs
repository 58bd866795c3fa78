use crate::error::{Result, UpdaterError};
use std::fs;
use std::path::{Path, PathBuf};

/// Marker subdirectory that identifies an instance root
pub const MARKER_DIR: &str = "minecraft";
/// File holding the package archive URL
pub const PACK_URL_FILE: &str = "pack_url";

/// A validated MultiMC instance directory
#[derive(Debug, Clone)]
pub struct Instance {
    root: PathBuf,
}

impl Instance {
    /// Validate `root` as an instance directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join(MARKER_DIR).is_dir() {
            return Err(UpdaterError::Validation(format!(
                "{} is not a MultiMC instance directory (no '{MARKER_DIR}/' inside)",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn mods_dir(&self) -> PathBuf {
        self.root.join(MARKER_DIR).join("mods")
    }

    /// Read the package archive URL from `pack_url`
    pub fn pack_url(&self) -> Result<String> {
        let path = self.root.join(PACK_URL_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            UpdaterError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        let url = content.trim();
        if url.is_empty() {
            return Err(UpdaterError::Config(format!("{} is empty", path.display())));
        }
        Ok(url.to_string())
    }
}
