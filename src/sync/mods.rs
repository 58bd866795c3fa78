use crate::cache::{verified_read, CacheLookup, ModCache};
use crate::checksum::{checksum_of, matches};
use crate::error::{Result, UpdaterError};
use crate::fetch::FileFetcher;
use crate::manifest::{ModKey, ModReference, Resolved};
use crate::resolver::{file_name_from_url, normalize_url, ContentApi, Resolver};
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::Path;

/// Where a synced mod's bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModSource {
    /// Verified copy from the previous mods directory
    Snapshot,
    /// Verified copy from the persistent mod cache
    Cache,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModOutcome {
    pub key: ModKey,
    pub file_name: String,
    pub source: ModSource,
}

#[derive(Debug)]
pub struct ModFailure {
    pub key: ModKey,
    pub required: bool,
    pub error: UpdaterError,
}

/// Per-mod results of one sync pass
#[derive(Debug, Default)]
pub struct ModSyncReport {
    pub synced: Vec<ModOutcome>,
    pub failed: Vec<ModFailure>,
}

impl ModSyncReport {
    #[must_use]
    pub fn count(&self, source: ModSource) -> usize {
        self.synced.iter().filter(|m| m.source == source).count()
    }

    fn fail(&mut self, entry: &ModReference, error: UpdaterError) {
        tracing::error!("{}: {}", entry.key(), error.summary());
        self.failed.push(ModFailure {
            key: entry.key(),
            required: entry.is_required(),
            error,
        });
    }
}

/// Everything one mod-sync pass needs
pub struct ModSync<'a, A> {
    pub resolver: &'a Resolver<A>,
    pub fetcher: &'a FileFetcher,
    pub cache: Option<&'a ModCache>,
    pub old_mods: &'a Path,
    pub mods_dir: &'a Path,
    pub concurrency: usize,
    pub progress: bool,
}

/// A resolved entry that owns its file name in `mods_dir`
struct PlannedMod {
    resolved: Resolved,
    file_name: String,
}

impl<A: ContentApi> ModSync<'_, A> {
    /// Bring every entry into `mods_dir`, collecting failures instead of stopping at the first.
    ///
    /// Resolution runs concurrently but file names are claimed in manifest order, so
    /// when two entries map to the same name the earlier one always wins.
    pub async fn run(&self, entries: Vec<ModReference>) -> ModSyncReport {
        let concurrency = self.concurrency.max(1);
        let mut report = ModSyncReport::default();

        let resolved: Vec<(ModReference, Result<Resolved>)> = stream::iter(entries)
            .map(|entry| async move {
                let result = self.resolve(&entry).await;
                (entry, result)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut claimed = HashSet::new();
        let mut planned = Vec::with_capacity(resolved.len());
        for (entry, result) in resolved {
            match result.and_then(|resolved| claim(&mut claimed, resolved)) {
                Ok(plan) => planned.push((entry, plan)),
                Err(error) => report.fail(&entry, error),
            }
        }

        let progress = if self.progress {
            let pb = ProgressBar::new(planned.len() as u64);
            pb.set_style(
                ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
        let pb = &progress;

        let results: Vec<(ModReference, Result<ModOutcome>)> = stream::iter(planned)
            .map(|(entry, plan)| async move {
                let result = self.materialize(entry.key(), &plan).await;
                pb.inc(1);
                pb.set_message(plan.file_name);
                (entry, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        progress.finish_and_clear();

        for (entry, result) in results {
            match result {
                Ok(outcome) => report.synced.push(outcome),
                Err(error) => report.fail(&entry, error),
            }
        }
        report.synced.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        report.failed.sort_by_key(|f| f.key);
        report
    }

    /// Place one planned mod: snapshot, then cache, then network
    async fn materialize(&self, key: ModKey, plan: &PlannedMod) -> Result<ModOutcome> {
        let PlannedMod {
            resolved,
            file_name,
        } = plan;
        let dest = self.mods_dir.join(file_name);
        let outcome = |source| ModOutcome {
            key,
            file_name: file_name.clone(),
            source,
        };

        // Without a checksum nothing local can be trusted
        if let Some(expected) = resolved.md5.as_deref() {
            match verified_read(&self.old_mods.join(file_name), Some(expected)).await? {
                CacheLookup::Hit(bytes) => {
                    tracing::debug!("{file_name} already exists");
                    tokio::fs::write(&dest, &bytes).await?;
                    return Ok(outcome(ModSource::Snapshot));
                }
                CacheLookup::Stale { actual } => {
                    let mismatch = UpdaterError::ChecksumMismatch {
                        subject: file_name.clone(),
                        expected: expected.to_string(),
                        actual,
                    };
                    tracing::warn!("{mismatch}; downloading again");
                }
                CacheLookup::Miss => {}
            }

            if let Some(cache) = self.cache {
                if let Some(bytes) = cache.lookup(key, Some(expected)).await? {
                    tracing::debug!("{file_name} served from cache");
                    tokio::fs::write(&dest, &bytes).await?;
                    return Ok(outcome(ModSource::Cache));
                }
            }
        }

        tracing::info!("Downloading {file_name} from {}", resolved.download_url);
        self.fetcher.fetch(&resolved.download_url, &dest).await?;

        if let Some(expected) = resolved.md5.as_deref() {
            let bytes = tokio::fs::read(&dest).await?;
            let actual = checksum_of(&bytes);
            if !matches(&actual, expected) {
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(UpdaterError::ChecksumMismatch {
                    subject: format!("{file_name} (downloaded)"),
                    expected: expected.to_string(),
                    actual,
                });
            }
            if let Some(cache) = self.cache {
                if let Err(e) = cache.store(key, &bytes).await {
                    tracing::warn!("Could not cache {file_name}: {e}");
                }
            }
        }

        Ok(outcome(ModSource::Download))
    }

    /// Recorded resolution if the manifest carries one, otherwise ask the resolver
    async fn resolve(&self, entry: &ModReference) -> Result<Resolved> {
        match entry.resolved() {
            Some(recorded) => Ok(Resolved {
                download_url: normalize_url(&recorded.download_url)?,
                md5: recorded.md5,
            }),
            None => self.resolver.resolve(entry.key()).await,
        }
    }
}

/// Reserve the resolved file name, rejecting a name an earlier entry already took
fn claim(claimed: &mut HashSet<String>, resolved: Resolved) -> Result<PlannedMod> {
    let file_name = file_name_from_url(&resolved.download_url)?;
    if !claimed.insert(file_name.clone()) {
        return Err(UpdaterError::Validation(format!(
            "{file_name} is already named by an earlier manifest entry"
        )));
    }
    Ok(PlannedMod {
        resolved,
        file_name,
    })
}

/// Move the live mods directory aside and start a fresh, empty one
pub fn snapshot_mods(mods_dir: &Path, old_mods: &Path) -> Result<()> {
    if mods_dir.exists() {
        crate::paths::move_tree(mods_dir, old_mods)?;
    } else {
        std::fs::create_dir_all(old_mods)?;
    }
    std::fs::create_dir_all(mods_dir)?;
    Ok(())
}
