//! Thema Refresh — bulk themed refresh of ad creatives across accounts.
//!
//! Reads a JSON list of ad-group targets, runs them as one job against the
//! sandbox API, and writes the failure/skip report. Live-platform runs embed
//! the engine crates with a transport-backed `AdsApi` instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use thema_core::config::AppConfig;
use thema_core::types::AdGroupTarget;
use thema_engine::{JobOrchestrator, MemoryJobStore, ThemeTemplates};
use thema_remote::{InMemoryAdsApi, SandboxSeed};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "thema-refresh")]
#[command(about = "Bulk themed refresh of ad creatives across accounts")]
#[command(version)]
struct Cli {
    /// JSON file with the ad-group targets to process
    #[arg(long)]
    targets: PathBuf,

    /// Optional JSON fixture seeding the sandbox accounts
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Theme for the generated copy (overrides config)
    #[arg(long, env = "THEMA_REFRESH__THEME")]
    theme: Option<String>,

    /// Log intended mutations without applying them
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Maximum accounts processed simultaneously (overrides config)
    #[arg(long, env = "THEMA_REFRESH__PERFORMANCE__MAX_CONCURRENT_ACCOUNTS")]
    max_concurrent: Option<usize>,

    /// Where to write the failure/skip report CSV
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thema_refresh=info,thema_engine=info,thema_remote=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(theme) = cli.theme {
        config.theme = theme;
    }
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(max_concurrent) = cli.max_concurrent {
        config.performance.max_concurrent_accounts = max_concurrent;
    }

    info!(
        theme = %config.theme,
        dry_run = config.dry_run,
        max_concurrent = config.performance.max_concurrent_accounts,
        "configuration loaded"
    );

    let raw = std::fs::read_to_string(&cli.targets)
        .with_context(|| format!("reading targets from {}", cli.targets.display()))?;
    let targets: Vec<AdGroupTarget> =
        serde_json::from_str(&raw).context("parsing ad-group targets")?;
    info!(targets = targets.len(), "targets loaded");

    let api = match &cli.seed {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading sandbox seed from {}", path.display()))?;
            let seed: SandboxSeed = serde_json::from_str(&raw).context("parsing sandbox seed")?;
            Arc::new(InMemoryAdsApi::from_seed(seed))
        }
        None => Arc::new(InMemoryAdsApi::new()),
    };

    let orchestrator = JobOrchestrator::new(
        Arc::new(MemoryJobStore::new()),
        api,
        Arc::new(ThemeTemplates::new()),
        config,
    );

    let input_source = Some(format!("upload:{}", cli.targets.display()));
    let job = orchestrator.create_job(&targets, input_source)?;
    let job = orchestrator.process_job(job.id).await?;

    info!(
        job_id = %job.id,
        status = ?job.status,
        total = job.total,
        successful = job.successful,
        failed = job.failed,
        skipped = job.skipped,
        "job finished"
    );

    if job.failed > 0 || job.skipped > 0 {
        let report = orchestrator.failure_report(job.id)?;
        match &cli.report {
            Some(path) => {
                std::fs::write(path, &report)
                    .with_context(|| format!("writing report to {}", path.display()))?;
                info!(path = %path.display(), "failure/skip report written");
            }
            None => print!("{report}"),
        }
    }

    if job.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
