//! Path containment and tree operations for paths drawn from a package archive.

use crate::error::{Result, UpdaterError};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Join a descriptor-supplied relative path onto `root`, refusing anything that escapes it.
///
/// Absolute paths and `..` components are rejected lexically. The deepest existing
/// ancestor of the result is then canonicalized so a symlink inside `root` cannot
/// redirect a mutation outside of it.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(UpdaterError::Validation(format!(
                    "path '{relative}' escapes {}",
                    root.display()
                )));
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(UpdaterError::Validation(format!(
            "empty path '{relative}' in update descriptor"
        )));
    }

    let joined = root.join(&clean);
    ensure_contained(root, &joined)?;
    Ok(joined)
}

/// Verify that the existing part of `path` canonicalizes inside `root`
fn ensure_contained(root: &Path, path: &Path) -> Result<()> {
    let root_canonical = root.canonicalize()?;

    let mut candidate = path;
    let existing = loop {
        if candidate.symlink_metadata().is_ok() {
            break candidate;
        }
        match candidate.parent() {
            Some(parent) => candidate = parent,
            None => return Ok(()),
        }
    };

    let canonical = match existing.canonicalize() {
        Ok(canonical) => canonical,
        // Dangling symlink: judge by its parent directory
        Err(e) if e.kind() == io::ErrorKind::NotFound => match existing.parent() {
            Some(parent) => parent.canonicalize()?,
            None => return Ok(()),
        },
        Err(e) => return Err(e.into()),
    };

    if canonical.starts_with(&root_canonical) {
        Ok(())
    } else {
        Err(UpdaterError::Validation(format!(
            "{} resolves outside {}",
            path.display(),
            root.display()
        )))
    }
}

/// Lexically normalized form used to compare descriptor paths with each other
#[must_use]
pub fn normalized(relative: &str) -> PathBuf {
    Path::new(relative)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Remove a file, symlink or directory tree
pub fn remove_path(path: &Path) -> io::Result<()> {
    let meta = path.symlink_metadata()?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Recursively copy a directory tree, creating `dst`
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move a directory, falling back to copy + remove across filesystems
pub fn move_tree(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(
                "rename {} -> {} failed ({e}), copying instead",
                src.display(),
                dst.display()
            );
            copy_tree(src, dst)?;
            fs::remove_dir_all(src)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_plain_relative() {
        let root = TempDir::new().unwrap();
        let path = resolve_within(root.path(), "config/foo.cfg").unwrap();
        assert_eq!(path, root.path().join("config/foo.cfg"));

        let path = resolve_within(root.path(), "./config/./foo.cfg").unwrap();
        assert_eq!(path, root.path().join("config/foo.cfg"));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let root = TempDir::new().unwrap();
        for bad in ["../outside", "config/../../outside", "/etc/passwd", "", "."] {
            let result = resolve_within(root.path(), bad);
            assert!(
                matches!(result, Err(UpdaterError::Validation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        let result = resolve_within(root.path(), "link/file.txt");
        assert!(matches!(result, Err(UpdaterError::Validation(_))));
    }

    #[test]
    fn test_normalized() {
        assert_eq!(normalized("./config/a.cfg"), PathBuf::from("config/a.cfg"));
        assert_eq!(normalized("config/"), PathBuf::from("config"));
    }

    #[test]
    fn test_copy_and_move_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested/b.txt"), "b").unwrap();

        let copy = dir.path().join("copy");
        copy_tree(&src, &copy).unwrap();
        assert_eq!(fs::read_to_string(copy.join("nested/b.txt")).unwrap(), "b");

        let moved = dir.path().join("moved");
        move_tree(&src, &moved).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(moved.join("a.txt")).unwrap(), "a");

        remove_path(&moved).unwrap();
        assert!(!moved.exists());
    }
}
