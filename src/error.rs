use thiserror::Error;

/// Main error type for the updater
#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("Validation error: {0}\n\nTroubleshooting:\n- Run modpack-updater from inside the MultiMC instance directory (the one containing 'minecraft/')\n- Check update.json for absolute or '..' paths")]
    Validation(String),

    #[error("Content API unavailable for {subject} after {attempts} attempt(s): {last_error}\n\nTroubleshooting:\n- Check internet connection\n- The content API may be rate limiting; try again in a moment\n- Raise [retry] max_attempts or delay_ms in updater.toml")]
    UpstreamUnavailable {
        subject: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Checksum mismatch for {subject}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("Content API error: {0}")]
    Api(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: updater.toml in the instance or ~/.config/modpack-updater/config.toml\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("Invalid JSON in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdaterError {
    /// Short one-line form for per-mod failure summaries
    #[must_use]
    pub fn summary(&self) -> String {
        self.to_string()
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

pub type Result<T> = std::result::Result<T, UpdaterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_drops_troubleshooting() {
        let err = UpdaterError::UpstreamUnavailable {
            subject: "238222/2988823".to_string(),
            attempts: 3,
            last_error: "HTTP 503".to_string(),
        };

        let summary = err.summary();
        assert!(summary.contains("238222/2988823"));
        assert!(summary.contains("3 attempt(s)"));
        assert!(!summary.contains("Troubleshooting"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: UpdaterError = io.into();
        assert!(matches!(err, UpdaterError::Io(_)));
    }
}
