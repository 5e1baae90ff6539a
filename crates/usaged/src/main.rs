//! usaged — the usage metrics daemon.
//!
//! Opens the usage ledger, republishes it as tenant and bucket counters on
//! a fixed interval, and shuts the refresh loop down cleanly on Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! usaged run --config /etc/usaged/usage.toml
//! usaged run --db-path /var/lib/usage/usage.redb --refresh-interval 30
//! usaged inspect --db-path /var/lib/usage/usage.redb --format json
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use usage_metrics::{
    CONTAINER_FAMILY, CounterCache, CounterRegistry, CounterRouter, LruCounterCache, RefreshLoop,
    TENANT_FAMILY, UsageField, UsageMetrics, UsageMetricsConfig,
};
use usage_state::UsageStore;

#[derive(Parser)]
#[command(name = "usaged", about = "Usage metrics daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh usage counters until interrupted.
    Run {
        /// TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Usage ledger path (overrides the config file).
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Refresh interval in seconds (overrides the config file).
        #[arg(long)]
        refresh_interval: Option<u64>,

        /// Tracked keys per counter family (overrides the config file).
        #[arg(long)]
        cache_capacity: Option<usize>,
    },
    /// Run a single refresh cycle and print every counter.
    Inspect {
        /// Usage ledger path.
        #[arg(long)]
        db_path: PathBuf,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,usaged=debug,usage_metrics=debug")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            db_path,
            refresh_interval,
            cache_capacity,
        } => {
            let config =
                resolve_config(config.as_deref(), db_path, refresh_interval, cache_capacity)?;
            run(config).await
        }
        Command::Inspect { db_path, format } => inspect(&db_path, &format),
    }
}

fn resolve_config(
    file: Option<&Path>,
    db_path: Option<PathBuf>,
    refresh_interval: Option<u64>,
    cache_capacity: Option<usize>,
) -> anyhow::Result<UsageMetricsConfig> {
    let mut config = match (file, db_path.as_ref()) {
        (Some(path), _) => UsageMetricsConfig::from_file(path)?,
        (None, Some(db_path)) => UsageMetricsConfig::new(db_path),
        (None, None) => anyhow::bail!("either --config or --db-path is required"),
    };
    if let Some(db_path) = db_path {
        config.db_path = db_path;
    }
    if let Some(secs) = refresh_interval {
        config.refresh_interval = secs;
    }
    if let Some(capacity) = cache_capacity {
        config.cache_capacity = capacity;
    }
    Ok(config)
}

async fn run(config: UsageMetricsConfig) -> anyhow::Result<()> {
    info!("usage metrics daemon starting");

    let registry = CounterRegistry::new();
    let mut metrics: UsageMetrics = UsageMetrics::new(registry.clone());
    metrics.start((), &config)?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let tracked: usize = registry
        .family_names()
        .iter()
        .filter_map(|name| registry.family(name))
        .map(|cache| cache.len())
        .sum();
    info!(tracked, "stopping usage metrics");

    // stop() joins the refresh thread; keep that off the async workers.
    tokio::task::spawn_blocking(move || metrics.stop()).await?;

    info!("usage metrics daemon stopped");
    Ok(())
}

fn inspect(db_path: &Path, format: &str) -> anyhow::Result<()> {
    let store = UsageStore::open(db_path)?;
    let capacity = usize::try_from(store.len()?)
        .ok()
        .and_then(NonZeroUsize::new)
        .unwrap_or(NonZeroUsize::MIN);

    let registry = CounterRegistry::new();
    let tenant = Arc::new(LruCounterCache::new(capacity));
    let container = Arc::new(LruCounterCache::new(capacity));
    registry.register(TENANT_FAMILY, tenant.clone());
    registry.register(CONTAINER_FAMILY, container.clone());

    let refresh = RefreshLoop::new(
        store,
        CounterRouter::new(tenant, container),
        Duration::ZERO,
    );
    let Some(stats) = refresh.refresh_once() else {
        anyhow::bail!("could not read a snapshot of {}", db_path.display());
    };
    info!(
        visited = stats.visited,
        applied = stats.applied,
        malformed = stats.malformed,
        "usage ledger inspected"
    );

    if format != "json" {
        for field in UsageField::ALL {
            println!("# {} {}", field.name(), field.description());
        }
    }
    for sample in registry.collect() {
        match format {
            "json" => println!("{}", serde_json::to_string(&sample)?),
            _ => println!(
                "{} {} {} {}",
                sample.family,
                sample.key,
                sample.field.name(),
                sample.value
            ),
        }
    }
    Ok(())
}
