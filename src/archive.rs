//! Zip extraction for the downloaded package archive.

use crate::error::{Result, UpdaterError};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Extract a zip archive into `dest_dir`.
///
/// Entries whose names would land outside `dest_dir` are rejected.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    fs::create_dir_all(dest_dir)?;

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| UpdaterError::Archive(format!("Failed to open zip: {e}")))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| UpdaterError::Archive(format!("Failed to read zip entry: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(UpdaterError::Validation(format!(
                "archive entry '{}' escapes the extraction directory",
                entry.name()
            )));
        };
        let outpath = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        std::io::copy(&mut entry, &mut outfile)?;
        extracted += 1;
    }

    Ok(extracted)
}
