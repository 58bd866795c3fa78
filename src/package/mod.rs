//! Pre-publish manifest enrichment.
//!
//! Walks an authoring-time `manifest.json`, resolves every mod that lacks a
//! download URL and checksum (or whose cached copy no longer matches the recorded
//! checksum) and writes the manifest back so installs rarely need live resolution.

use crate::cache::{CacheLookup, ModCache};
use crate::checksum::{file_checksum, matches};
use crate::config::Config;
use crate::error::{Result, UpdaterError};
use crate::fetch::FileFetcher;
use crate::manifest::{ModKey, ModManifest, ModReference, Resolved};
use crate::resolver::{ContentApi, CurseApi, Resolver};
use crate::retry::RetryPolicy;
use crate::sync::ModFailure;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default cache location, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = "cache/mods";

/// What happened to one manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackAction {
    /// Already carried verified metadata
    Kept,
    /// Resolved through the content API and rewritten
    Resolved,
}

#[derive(Debug, Default)]
pub struct PackReport {
    pub kept: usize,
    pub resolved: usize,
    /// Mod files downloaded into the cache (`--fetch`)
    pub fetched: usize,
    pub failures: Vec<ModFailure>,
}

impl PackReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for PackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Manifest: {} kept, {} resolved, {} fetched, {} failed",
            self.kept,
            self.resolved,
            self.fetched,
            self.failures.len()
        )?;
        for failure in &self.failures {
            writeln!(f, "  ✗ {}: {}", failure.key, failure.error.summary())?;
        }
        Ok(())
    }
}

struct EntryOutcome {
    entry: ModReference,
    action: PackAction,
    fetched: bool,
}

pub struct Packager<A> {
    resolver: Resolver<A>,
    cache: ModCache,
    fetcher: Option<FileFetcher>,
    concurrency: usize,
}

impl Packager<CurseApi> {
    /// Build a packager from config. `fetch` enables downloading mods into the cache.
    pub fn from_config(config: &Config, cache_dir: Option<PathBuf>, fetch: bool) -> Result<Self> {
        let api = CurseApi::new(&config.api)?;
        let resolver = Resolver::new(api, RetryPolicy::from(&config.retry));
        let cache = ModCache::open(cache_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)))?;
        let fetcher = if fetch {
            Some(FileFetcher::new(&config.api)?)
        } else {
            None
        };

        Ok(Self::new(resolver, cache, fetcher).with_concurrency(config.sync.concurrency))
    }
}

impl<A: ContentApi> Packager<A> {
    #[must_use]
    pub fn new(resolver: Resolver<A>, cache: ModCache, fetcher: Option<FileFetcher>) -> Self {
        Self {
            resolver,
            cache,
            fetcher,
            concurrency: 4,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub const fn resolver(&self) -> &Resolver<A> {
        &self.resolver
    }

    /// Enrich the manifest at `path` in place
    pub async fn run(&self, path: &Path) -> Result<PackReport> {
        let mut manifest = ModManifest::load(path)?;
        tracing::info!("Packaging {} ({} mods)", path.display(), manifest.files.len());

        let report = self.enrich(&mut manifest).await;
        manifest.save(path)?;
        Ok(report)
    }

    /// Resolve what needs resolving. Entries are never dropped; failed ones stay as they were.
    ///
    /// Each (projectID, fileID) pair is resolved and fetched once; duplicate entries
    /// receive the same metadata as the first occurrence.
    pub async fn enrich(&self, manifest: &mut ModManifest) -> PackReport {
        let unique = manifest.unique_files();
        let entries = std::mem::take(&mut manifest.files);

        let results: Vec<(ModReference, Result<EntryOutcome>)> = stream::iter(unique)
            .map(|entry| async move {
                let result = self.pack_one(entry.clone()).await;
                (entry, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = PackReport::default();
        let mut recorded: HashMap<ModKey, Resolved> = HashMap::new();
        for (original, result) in results {
            match result {
                Ok(outcome) => {
                    match outcome.action {
                        PackAction::Kept => report.kept += 1,
                        PackAction::Resolved => report.resolved += 1,
                    }
                    if outcome.fetched {
                        report.fetched += 1;
                    }
                    if let Some(resolved) = outcome.entry.resolved() {
                        recorded.insert(outcome.entry.key(), resolved);
                    }
                }
                Err(error) => {
                    tracing::error!("{}: {}", original.key(), error.summary());
                    report.failures.push(ModFailure {
                        key: original.key(),
                        required: original.is_required(),
                        error,
                    });
                }
            }
        }

        for mut entry in entries {
            if let Some(resolved) = recorded.get(&entry.key()) {
                entry.enrich(resolved);
            }
            manifest.files.push(entry);
        }
        report
    }

    async fn pack_one(&self, mut entry: ModReference) -> Result<EntryOutcome> {
        let key = entry.key();

        if let Some(recorded) = entry.resolved() {
            if let Some(md5) = recorded.md5.as_deref() {
                match self.cache.inspect(key, Some(md5)).await? {
                    CacheLookup::Hit(_) => {
                        tracing::debug!("{key} verified against cache");
                        return Ok(EntryOutcome {
                            entry,
                            action: PackAction::Kept,
                            fetched: false,
                        });
                    }
                    CacheLookup::Miss => {
                        let fetched = self.populate(key, &recorded).await?;
                        return Ok(EntryOutcome {
                            entry,
                            action: PackAction::Kept,
                            fetched,
                        });
                    }
                    CacheLookup::Stale { actual } => {
                        tracing::warn!(
                            "{key}: cached file has checksum {actual}, manifest records {md5}; resolving again"
                        );
                    }
                }
            }
        }

        let resolved = self.resolver.resolve(key).await?;
        println!("Resolved {key} -> {}", resolved.download_url);
        entry.enrich(&resolved);
        let fetched = self.populate(key, &resolved).await?;

        Ok(EntryOutcome {
            entry,
            action: PackAction::Resolved,
            fetched,
        })
    }

    /// Download into the cache when fetching is enabled, verifying the checksum when known
    async fn populate(&self, key: ModKey, resolved: &Resolved) -> Result<bool> {
        let Some(fetcher) = &self.fetcher else {
            return Ok(false);
        };

        let path = self.cache.entry_path(key);
        fetcher.fetch(&resolved.download_url, &path).await?;

        if let Some(expected) = resolved.md5.as_deref() {
            let actual = file_checksum(&path).await?;
            if !matches(&actual, expected) {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(UpdaterError::ChecksumMismatch {
                    subject: key.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(true)
    }
}
