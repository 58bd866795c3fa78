use crate::error::{Result, UpdaterError};
use crate::manifest::UpdateDescriptor;
use crate::paths::{copy_tree, remove_path, resolve_within};
use std::fs;
use std::path::{Path, PathBuf};

/// What the delete/copy phase did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaReport {
    pub deleted: Vec<String>,
    pub copied: Vec<String>,
    /// Copy destinations that already existed and were left untouched
    pub kept: Vec<String>,
}

struct PlannedCopy<'a> {
    label: &'a str,
    source: PathBuf,
    destination: PathBuf,
}

/// Apply an update descriptor to the instance.
///
/// Every path is resolved and checked for containment before anything is
/// mutated. Deletions of missing paths are skipped; copies never overwrite.
pub fn apply(
    descriptor: &UpdateDescriptor,
    instance_root: &Path,
    extract_root: &Path,
) -> Result<DeltaReport> {
    descriptor.validate()?;

    let deletions = descriptor
        .delete
        .iter()
        .map(|rel| Ok((rel.as_str(), resolve_within(instance_root, rel)?)))
        .collect::<Result<Vec<_>>>()?;

    let copies = descriptor
        .copy
        .iter()
        .map(|copy| {
            let source = resolve_within(extract_root, copy.source())?;
            if source.symlink_metadata().is_err() {
                return Err(UpdaterError::Validation(format!(
                    "copy source '{}' is not in the package",
                    copy.source()
                )));
            }
            Ok(PlannedCopy {
                label: copy.destination(),
                source,
                destination: resolve_within(instance_root, copy.destination())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut report = DeltaReport::default();

    for (label, path) in deletions {
        if path.symlink_metadata().is_err() {
            continue;
        }
        println!("Removing {label}...");
        remove_path(&path)?;
        report.deleted.push(label.to_string());
    }

    for copy in copies {
        if copy.destination.symlink_metadata().is_ok() {
            tracing::debug!("{} already exists, leaving it", copy.label);
            report.kept.push(copy.label.to_string());
            continue;
        }

        println!("Copying {}...", copy.label);
        if copy.source.is_dir() {
            copy_tree(&copy.source, &copy.destination)?;
        } else {
            if let Some(parent) = copy.destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&copy.source, &copy.destination)?;
        }
        report.copied.push(copy.label.to_string());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::CopyInstruction;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        instance: PathBuf,
        extract: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let instance = dir.path().join("instance");
        let extract = dir.path().join("extract");
        fs::create_dir_all(instance.join("minecraft/config")).unwrap();
        fs::create_dir_all(extract.join("overrides/scripts")).unwrap();
        fs::write(extract.join("a.txt"), "from archive").unwrap();
        fs::write(extract.join("overrides/scripts/init.zs"), "print(1)").unwrap();
        Fixture {
            _dir: dir,
            instance,
            extract,
        }
    }

    #[test]
    fn test_delete_files_and_dirs_skipping_missing() {
        let fx = fixture();
        fs::write(fx.instance.join("minecraft/config/old.cfg"), "old").unwrap();
        fs::create_dir_all(fx.instance.join("minecraft/oldscripts/sub")).unwrap();

        let descriptor = UpdateDescriptor {
            delete: vec![
                "minecraft/config/old.cfg".to_string(),
                "minecraft/oldscripts".to_string(),
                "minecraft/never-existed".to_string(),
            ],
            copy: vec![],
        };

        let report = apply(&descriptor, &fx.instance, &fx.extract).unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(!fx.instance.join("minecraft/config/old.cfg").exists());
        assert!(!fx.instance.join("minecraft/oldscripts").exists());
        assert!(fx.instance.join("minecraft/config").exists());
    }

    #[test]
    fn test_copy_never_overwrites() {
        let fx = fixture();
        fs::write(fx.instance.join("b.txt"), "pre-existing").unwrap();

        let descriptor = UpdateDescriptor {
            delete: vec![],
            copy: vec![CopyInstruction::Pair("a.txt".to_string(), "b.txt".to_string())],
        };

        let report = apply(&descriptor, &fx.instance, &fx.extract).unwrap();
        assert_eq!(report.kept, vec!["b.txt"]);
        assert!(report.copied.is_empty());
        assert_eq!(
            fs::read_to_string(fx.instance.join("b.txt")).unwrap(),
            "pre-existing"
        );
    }

    #[test]
    fn test_copy_files_and_trees() {
        let fx = fixture();
        let descriptor = UpdateDescriptor {
            delete: vec![],
            copy: vec![
                CopyInstruction::Pair(
                    "overrides/scripts".to_string(),
                    "minecraft/scripts".to_string(),
                ),
                CopyInstruction::Pair("a.txt".to_string(), "minecraft/new/dir/a.txt".to_string()),
            ],
        };

        let report = apply(&descriptor, &fx.instance, &fx.extract).unwrap();
        assert_eq!(report.copied.len(), 2);
        assert_eq!(
            fs::read_to_string(fx.instance.join("minecraft/scripts/init.zs")).unwrap(),
            "print(1)"
        );
        assert_eq!(
            fs::read_to_string(fx.instance.join("minecraft/new/dir/a.txt")).unwrap(),
            "from archive"
        );
    }

    #[test]
    fn test_second_application_is_a_no_op() {
        let fx = fixture();
        fs::write(fx.instance.join("gone.txt"), "x").unwrap();
        let descriptor = UpdateDescriptor {
            delete: vec!["gone.txt".to_string()],
            copy: vec![CopyInstruction::Same("a.txt".to_string())],
        };

        let first = apply(&descriptor, &fx.instance, &fx.extract).unwrap();
        assert_eq!(first.deleted, vec!["gone.txt"]);
        assert_eq!(first.copied, vec!["a.txt"]);

        let second = apply(&descriptor, &fx.instance, &fx.extract).unwrap();
        assert!(second.deleted.is_empty());
        assert!(second.copied.is_empty());
        assert_eq!(second.kept, vec!["a.txt"]);
    }

    #[test]
    fn test_escaping_paths_rejected_before_mutation() {
        let fx = fixture();
        fs::write(fx.instance.join("keep.txt"), "x").unwrap();

        let descriptor = UpdateDescriptor {
            delete: vec!["keep.txt".to_string(), "../outside".to_string()],
            copy: vec![],
        };
        let result = apply(&descriptor, &fx.instance, &fx.extract);
        assert!(matches!(result, Err(UpdaterError::Validation(_))));
        assert!(fx.instance.join("keep.txt").exists());

        let descriptor = UpdateDescriptor {
            delete: vec![],
            copy: vec![CopyInstruction::Pair("a.txt".to_string(), "/tmp/evil".to_string())],
        };
        assert!(apply(&descriptor, &fx.instance, &fx.extract).is_err());
    }

    #[test]
    fn test_missing_copy_source_rejected() {
        let fx = fixture();
        let descriptor = UpdateDescriptor {
            delete: vec![],
            copy: vec![CopyInstruction::Same("nope.txt".to_string())],
        };
        assert!(matches!(
            apply(&descriptor, &fx.instance, &fx.extract),
            Err(UpdaterError::Validation(_))
        ));
    }
}
