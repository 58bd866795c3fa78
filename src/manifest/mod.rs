pub mod update;

pub use update::{CopyInstruction, UpdateDescriptor};

use crate::error::{Result, UpdaterError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;

/// (projectID, fileID) pair naming one published mod file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModKey {
    pub project_id: u64,
    pub file_id: u64,
}

impl ModKey {
    #[must_use]
    pub const fn new(project_id: u64, file_id: u64) -> Self {
        Self {
            project_id,
            file_id,
        }
    }
}

impl fmt::Display for ModKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.file_id)
    }
}

/// Download URL and checksum derived from a [`ModKey`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub download_url: String,
    pub md5: Option<String>,
}

/// One entry of `manifest.json`'s `files` list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModReference {
    #[serde(rename = "projectID")]
    pub project_id: u64,
    #[serde(rename = "fileID")]
    pub file_id: u64,
    #[serde(
        rename = "downloadUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    /// Absent means required; kept absent on write-back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Fields this tool does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModReference {
    #[must_use]
    pub fn new(project_id: u64, file_id: u64) -> Self {
        Self {
            project_id,
            file_id,
            download_url: None,
            md5: None,
            required: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }

    #[must_use]
    pub const fn key(&self) -> ModKey {
        ModKey::new(self.project_id, self.file_id)
    }

    /// Previously recorded resolution, if the entry carries a download URL
    #[must_use]
    pub fn resolved(&self) -> Option<Resolved> {
        self.download_url.as_ref().map(|url| Resolved {
            download_url: url.clone(),
            md5: self.md5.clone(),
        })
    }

    /// Record a fresh resolution on this entry
    pub fn enrich(&mut self, resolved: &Resolved) {
        self.download_url = Some(resolved.download_url.clone());
        self.md5.clone_from(&resolved.md5);
    }
}

/// `manifest.json`: the mod list shipped with a pack release
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModManifest {
    #[serde(default)]
    pub files: Vec<ModReference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| UpdaterError::Json {
            file: origin.display().to_string(),
            source,
        })
    }

    /// Save manifest to file atomically (tmp + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self).map_err(|source| UpdaterError::Json {
            file: path.display().to_string(),
            source,
        })?;

        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Entries with duplicate keys removed, first occurrence wins
    #[must_use]
    pub fn unique_files(&self) -> Vec<ModReference> {
        let mut seen = std::collections::HashSet::new();
        self.files
            .iter()
            .filter(|m| {
                let fresh = seen.insert(m.key());
                if !fresh {
                    tracing::warn!("Duplicate manifest entry {} is handled once", m.key());
                }
                fresh
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "minecraft": {"version": "1.12.2"},
        "name": "Sample Pack",
        "files": [
            {"projectID": 238222, "fileID": 2988823, "required": true},
            {"projectID": 32274, "fileID": 2920433, "downloadUrl": "https://edge.example/files/2920/433/JourneyMap.jar", "md5": "abc123", "required": false}
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ModManifest::parse(SAMPLE, Path::new("manifest.json")).unwrap();
        assert_eq!(manifest.files.len(), 2);

        let first = &manifest.files[0];
        assert_eq!(first.key(), ModKey::new(238_222, 2_988_823));
        assert!(first.resolved().is_none());
        assert!(first.is_required());

        let second = &manifest.files[1];
        let resolved = second.resolved().unwrap();
        assert_eq!(
            resolved.download_url,
            "https://edge.example/files/2920/433/JourneyMap.jar"
        );
        assert_eq!(resolved.md5.as_deref(), Some("abc123"));
        assert!(!second.is_required());
    }

    #[test]
    fn test_missing_required_defaults_true() {
        let manifest = ModManifest::parse(
            r#"{"files": [{"projectID": 1, "fileID": 2}]}"#,
            Path::new("m.json"),
        )
        .unwrap();
        assert!(manifest.files[0].is_required());
    }

    #[test]
    fn test_absent_required_not_written_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = ModManifest::parse(
            r#"{"files": [{"projectID": 1, "fileID": 2}, {"projectID": 3, "fileID": 4, "required": false}]}"#,
            &path,
        )
        .unwrap();
        manifest.files[0].enrich(&Resolved {
            download_url: "https://edge.example/files/1/2/a.jar".to_string(),
            md5: None,
        });
        manifest.save(&path).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["files"][0].get("required").is_none());
        assert_eq!(raw["files"][1]["required"], false);
    }

    #[test]
    fn test_invalid_json_reports_file() {
        let err = ModManifest::parse("{not json", Path::new("manifest.json")).unwrap_err();
        assert!(err.to_string().contains("manifest.json"));
    }

    #[test]
    fn test_enrich_and_save_preserves_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = ModManifest::parse(SAMPLE, &path).unwrap();
        manifest.files[0].enrich(&Resolved {
            download_url: "https://edge.example/files/2988/823/Mod.jar".to_string(),
            md5: Some("ffee".to_string()),
        });
        manifest.save(&path).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["name"], "Sample Pack");
        assert_eq!(raw["minecraft"]["version"], "1.12.2");
        assert_eq!(
            raw["files"][0]["downloadUrl"],
            "https://edge.example/files/2988/823/Mod.jar"
        );
        assert_eq!(raw["files"][0]["md5"], "ffee");

        let loaded = ModManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_unique_files() {
        let mut manifest = ModManifest::default();
        manifest.files.push(ModReference::new(1, 1));
        manifest.files.push(ModReference::new(1, 2));
        manifest.files.push(ModReference::new(1, 1));

        let unique = manifest.unique_files();
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[1].key(), ModKey::new(1, 2));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(ModKey::new(238_222, 2_988_823).to_string(), "238222/2988823");
    }
}
