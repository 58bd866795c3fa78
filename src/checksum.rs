//! MD5 content digests used to decide whether cached mod bytes can be trusted.

use crate::error::Result;
use md5::{Digest, Md5};
use std::path::Path;

/// Lowercase hex MD5 of a byte slice
#[must_use]
pub fn checksum_of(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compare a computed digest against a recorded one, ignoring hex case
#[must_use]
pub fn matches(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}

/// MD5 of a file on disk
pub async fn file_checksum(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(checksum_of(&bytes))
}
