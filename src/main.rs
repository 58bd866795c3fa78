#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use modpack_updater::config::Config;
use modpack_updater::instance::Instance;
use modpack_updater::package::Packager;
use modpack_updater::sync::Reconciler;
use std::future::Future;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modpack-updater")]
#[command(about = "Keep a MultiMC instance in sync with a published modpack", long_about = None)]
#[command(version)]
struct Cli {
    /// MultiMC instance directory
    #[arg(long, global = true, default_value = ".")]
    instance: PathBuf,

    /// Config file (defaults to updater.toml in the instance, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the pack and bring the instance up to date (default)
    Update {
        /// Exit without waiting for ENTER
        #[arg(long)]
        no_pause: bool,
    },
    /// Resolve download URLs and checksums into a manifest before publishing
    Package {
        #[arg(long, default_value = "manifest.json")]
        manifest: PathBuf,
        /// Mod cache directory (default: ./cache/mods)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Also download every mod into the cache
        #[arg(long)]
        fetch: bool,
    },
}

/// How a run that did not hit a fatal error ended
enum Outcome {
    Complete,
    Partial,
}

const EXIT_PARTIAL: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match Config::load(cli.config.as_deref(), &cli.instance) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Commands::Update { no_pause: false }) {
        Commands::Update { no_pause } => {
            let code = supervise(&config, run_update(&cli.instance, &config)).await;
            if !no_pause && config.sync.pause_on_exit {
                wait_for_enter();
            }
            code
        }
        Commands::Package {
            manifest,
            cache_dir,
            fetch,
        } => supervise(&config, run_package(&manifest, cache_dir, fetch, &config)).await,
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,modpack_updater={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run `task` under the configured deadline, cancelling it on Ctrl-C.
///
/// Dropping the task drops its scratch area, which removes it from disk.
async fn supervise(
    config: &Config,
    task: impl Future<Output = anyhow::Result<Outcome>>,
) -> ExitCode {
    let deadline = config.sync.deadline();
    let bounded = async {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, task).await.unwrap_or_else(|_| {
                Err(anyhow::anyhow!(
                    "Run exceeded the {}s deadline",
                    limit.as_secs()
                ))
            }),
            None => task.await,
        }
    };

    tokio::select! {
        result = bounded => match result {
            Ok(Outcome::Complete) => ExitCode::SUCCESS,
            Ok(Outcome::Partial) => ExitCode::from(EXIT_PARTIAL),
            Err(e) => {
                tracing::debug!("Fatal: {e:?}");
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted, cleaning up");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run_update(instance_dir: &Path, config: &Config) -> anyhow::Result<Outcome> {
    let instance = Instance::open(instance_dir)?;
    tracing::info!("Updating instance at {}", instance.root().display());

    let reconciler = Reconciler::from_config(instance, config)?;
    let report = reconciler.run().await.context("Update failed")?;

    print!("{report}");
    if report.is_complete() {
        println!("Update successfully installed!");
        Ok(Outcome::Complete)
    } else {
        eprintln!(
            "Update installed, but {} mod(s) could not be synced",
            report.failures().len()
        );
        Ok(Outcome::Partial)
    }
}

async fn run_package(
    manifest: &Path,
    cache_dir: Option<PathBuf>,
    fetch: bool,
    config: &Config,
) -> anyhow::Result<Outcome> {
    let packager = Packager::from_config(config, cache_dir, fetch)?;
    let report = packager
        .run(manifest)
        .await
        .with_context(|| format!("Packaging {} failed", manifest.display()))?;

    print!("{report}");
    Ok(if report.is_complete() {
        Outcome::Complete
    } else {
        Outcome::Partial
    })
}

fn wait_for_enter() {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return;
    }
    println!("Press ENTER to exit");
    let mut line = String::new();
    let _ = stdin.read_line(&mut line);
}
