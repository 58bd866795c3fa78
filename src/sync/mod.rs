//! Manifest reconciliation: one update pass over a MultiMC instance.
//!
//! A run downloads the package archive into a [`Scratch`] area, extracts it, applies
//! `update.json` (delete/copy), rebuilds `minecraft/mods` from `manifest.json` and
//! copies `modlist.html` into the instance root.

pub mod delta;
pub mod mods;
pub mod scratch;

pub use delta::DeltaReport;
pub use mods::{ModFailure, ModOutcome, ModSource, ModSyncReport};
pub use scratch::Scratch;

use crate::archive::extract_zip;
use crate::cache::ModCache;
use crate::config::schema::SyncConfig;
use crate::config::Config;
use crate::error::{Result, UpdaterError};
use crate::fetch::FileFetcher;
use crate::instance::Instance;
use crate::manifest::{ModManifest, UpdateDescriptor};
use crate::resolver::{ContentApi, CurseApi, Resolver};
use crate::retry::RetryPolicy;
use mods::{snapshot_mods, ModSync};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const UPDATE_FILE: &str = "update.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const MODLIST_FILE: &str = "modlist.html";

/// Summary of one reconciliation run
#[derive(Debug, Default)]
pub struct SyncReport {
    pub delta: Option<DeltaReport>,
    pub mods: Option<ModSyncReport>,
    pub modlist_copied: bool,
}

impl SyncReport {
    /// True when every mod in the manifest was synced
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    #[must_use]
    pub fn failures(&self) -> &[ModFailure] {
        self.mods
            .as_ref()
            .map(|m| m.failed.as_slice())
            .unwrap_or_default()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(delta) = &self.delta {
            writeln!(
                f,
                "Files: {} removed, {} copied, {} already present",
                delta.deleted.len(),
                delta.copied.len(),
                delta.kept.len()
            )?;
        }
        if let Some(mods) = &self.mods {
            writeln!(
                f,
                "Mods: {} reused, {} from cache, {} downloaded, {} failed",
                mods.count(ModSource::Snapshot),
                mods.count(ModSource::Cache),
                mods.count(ModSource::Download),
                mods.failed.len()
            )?;
            for failure in &mods.failed {
                let marker = if failure.required { "" } else { " (optional)" };
                writeln!(f, "  ✗ {}{marker}: {}", failure.key, failure.error.summary())?;
            }
        }
        if self.modlist_copied {
            writeln!(f, "Mod list updated")?;
        }
        Ok(())
    }
}

/// Drives one update pass against an instance
pub struct Reconciler<A> {
    instance: Instance,
    resolver: Resolver<A>,
    fetcher: FileFetcher,
    cache: Option<ModCache>,
    archive_retry: RetryPolicy,
    sync: SyncConfig,
}

impl Reconciler<CurseApi> {
    /// Build a reconciler talking to the configured content API
    pub fn from_config(instance: Instance, config: &Config) -> Result<Self> {
        let api = CurseApi::new(&config.api)?;
        let resolver = Resolver::new(api, RetryPolicy::from(&config.retry));
        let fetcher = FileFetcher::new(&config.api)?;
        Self::new(instance, resolver, fetcher, config)
    }
}

impl<A: ContentApi> Reconciler<A> {
    pub fn new(
        instance: Instance,
        resolver: Resolver<A>,
        fetcher: FileFetcher,
        config: &Config,
    ) -> Result<Self> {
        let cache = config
            .sync
            .cache_dir
            .as_ref()
            .map(|dir| ModCache::open(dir.clone()))
            .transpose()?;

        Ok(Self {
            instance,
            resolver,
            fetcher,
            cache,
            archive_retry: RetryPolicy::from(&config.archive_retry),
            sync: config.sync.clone(),
        })
    }

    /// Run one full update pass.
    ///
    /// Fatal problems (unreadable `pack_url`, archive download, extraction,
    /// invalid descriptors, local I/O) return `Err`. Per-mod problems are
    /// collected in the report. The scratch area is removed on every path.
    pub async fn run(&self) -> Result<SyncReport> {
        let pack_url = self.instance.pack_url()?;
        let scratch = Arc::new(Scratch::create(self.sync.scratch_dir.as_deref())?);

        println!("=== Downloading update package ===");
        self.fetch_package(&pack_url, &scratch).await?;

        println!("=== Extracting ===");
        let extract_dir = scratch.extract_dir();
        {
            let archive = scratch.archive_path();
            let dest = extract_dir.clone();
            on_blocking_pool(Arc::clone(&scratch), move || extract_zip(&archive, &dest)).await?;
        }

        let mut report = SyncReport::default();

        let update_path = extract_dir.join(UPDATE_FILE);
        if update_path.is_file() {
            let descriptor = UpdateDescriptor::load(&update_path)?;
            println!("=== Updating files ===");
            report.delta = Some(self.apply_delta(&scratch, descriptor, extract_dir.clone()).await?);
        }

        let manifest_path = extract_dir.join(MANIFEST_FILE);
        if manifest_path.is_file() {
            let manifest = ModManifest::load(&manifest_path)?;
            println!("=== Updating mods ===");
            report.mods = Some(self.sync_mods(&scratch, &manifest).await?);
        }

        let modlist = extract_dir.join(MODLIST_FILE);
        if modlist.is_file() {
            tokio::fs::copy(&modlist, self.instance.root().join(MODLIST_FILE)).await?;
            report.modlist_copied = true;
        }

        Ok(report)
    }

    async fn fetch_package(&self, pack_url: &str, scratch: &Scratch) -> Result<()> {
        let archive_path = scratch.archive_path();
        self.archive_retry
            .run("download package", |_| self.fetcher.fetch(pack_url, &archive_path))
            .await
            .map(|bytes| tracing::info!("Package archive: {bytes} bytes"))
            .map_err(|exhausted| exhausted.last_error)
    }

    async fn apply_delta(
        &self,
        scratch: &Arc<Scratch>,
        descriptor: UpdateDescriptor,
        extract_dir: PathBuf,
    ) -> Result<DeltaReport> {
        let root = self.instance.root().to_path_buf();
        on_blocking_pool(Arc::clone(scratch), move || {
            delta::apply(&descriptor, &root, &extract_dir)
        })
        .await
    }

    async fn sync_mods(
        &self,
        scratch: &Arc<Scratch>,
        manifest: &ModManifest,
    ) -> Result<ModSyncReport> {
        let mods_dir = self.instance.mods_dir();
        let old_mods = scratch.old_mods_dir();

        {
            let mods_dir = mods_dir.clone();
            let old_mods = old_mods.clone();
            on_blocking_pool(Arc::clone(scratch), move || {
                snapshot_mods(&mods_dir, &old_mods)
            })
            .await?;
        }

        let pass = ModSync {
            resolver: &self.resolver,
            fetcher: &self.fetcher,
            cache: self.cache.as_ref(),
            old_mods: &old_mods,
            mods_dir: &mods_dir,
            concurrency: self.sync.concurrency,
            progress: self.sync.progress,
        };

        Ok(pass.run(manifest.unique_files()).await)
    }
}

/// Run filesystem work on the blocking pool.
///
/// The task holds its own handle on `scratch`, so if the awaiting future is dropped
/// (Ctrl-C, deadline) the directory is removed only after the work has stopped touching it.
async fn on_blocking_pool<T, F>(scratch: Arc<Scratch>, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = work();
        drop(scratch);
        result
    })
    .await
    .map_err(|e| UpdaterError::Io(std::io::Error::other(e)))?
}
