use crate::error::{Result, UpdaterError};
use crate::paths::normalized;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One `copy` entry: `[source, destination]`, or a bare path copied to the same place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CopyInstruction {
    Pair(String, String),
    Same(String),
}

impl CopyInstruction {
    /// Path relative to the extracted archive root
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Pair(source, _) | Self::Same(source) => source,
        }
    }

    /// Path relative to the installation root
    #[must_use]
    pub fn destination(&self) -> &str {
        match self {
            Self::Pair(_, destination) | Self::Same(destination) => destination,
        }
    }
}

/// `update.json`: non-mod files to delete from and copy into the instance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    #[serde(default)]
    pub delete: Vec<String>,
    #[serde(default)]
    pub copy: Vec<CopyInstruction>,
}

impl UpdateDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let descriptor: Self =
            serde_json::from_str(&content).map_err(|source| UpdaterError::Json {
                file: path.display().to_string(),
                source,
            })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Reject deletions that overlap a copy destination.
    ///
    /// Deleting a path that is also (or contains, or lies inside) a copy target
    /// would make the result depend on phase order.
    pub fn validate(&self) -> Result<()> {
        for deletion in &self.delete {
            let deleted = normalized(deletion);
            for copy in &self.copy {
                let target = normalized(copy.destination());
                if target.starts_with(&deleted) || deleted.starts_with(&target) {
                    return Err(UpdaterError::Validation(format!(
                        "update.json deletes '{deletion}' and copies to '{}'",
                        copy.destination()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_pairs_and_bare_paths() {
        let descriptor: UpdateDescriptor = serde_json::from_str(
            r#"{
                "delete": ["config/old.cfg", "scripts"],
                "copy": [["overrides/options.txt", "minecraft/options.txt"], "minecraft/config/new.cfg"]
            }"#,
        )
        .unwrap();

        assert_eq!(descriptor.delete, vec!["config/old.cfg", "scripts"]);
        assert_eq!(descriptor.copy.len(), 2);
        assert_eq!(descriptor.copy[0].source(), "overrides/options.txt");
        assert_eq!(descriptor.copy[0].destination(), "minecraft/options.txt");
        assert_eq!(descriptor.copy[1].source(), "minecraft/config/new.cfg");
        assert_eq!(descriptor.copy[1].destination(), "minecraft/config/new.cfg");
    }

    #[test]
    fn test_missing_lists_default_empty() {
        let descriptor: UpdateDescriptor = serde_json::from_str("{}").unwrap();
        assert!(descriptor.delete.is_empty());
        assert!(descriptor.copy.is_empty());
    }

    #[test]
    fn test_overlap_rejected() {
        let descriptor = UpdateDescriptor {
            delete: vec!["minecraft/config".to_string()],
            copy: vec![CopyInstruction::Pair(
                "config/a.cfg".to_string(),
                "minecraft/config/a.cfg".to_string(),
            )],
        };
        assert!(matches!(
            descriptor.validate(),
            Err(UpdaterError::Validation(_))
        ));

        let descriptor = UpdateDescriptor {
            delete: vec!["minecraft/config/a.cfg".to_string()],
            copy: vec![CopyInstruction::Same("minecraft/config".to_string())],
        };
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_sibling_paths_allowed() {
        let descriptor = UpdateDescriptor {
            delete: vec!["minecraft/config/old.cfg".to_string()],
            copy: vec![CopyInstruction::Same("minecraft/config/old.cfg.new".to_string())],
        };
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_load_validates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("update.json");
        fs::write(&path, r#"{"delete": ["a"], "copy": [["x", "a/b"]]}"#).unwrap();
        assert!(UpdateDescriptor::load(&path).is_err());
    }
}
