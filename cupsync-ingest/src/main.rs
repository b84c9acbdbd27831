//! cupsync-ingest: club cup campaign archive sync
//!
//! Subcommands:
//! - `sync`: fetch the campaigns listed in an ids file and merge them
//! - `pin`: fetch one campaign under an operator-forced edition number
//! - `apply-overrides`: re-apply the override sheet to the whole archive
//! - `resolve`: resolve outstanding author identifiers in the archive

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cupsync_common::config::IngestConfig;
use cupsync_common::store;
use cupsync_ingest::merge;
use cupsync_ingest::pipeline::SyncPipeline;
use cupsync_ingest::services::author_resolver::AuthorResolver;
use cupsync_ingest::services::campaign_client::CampaignClient;
use cupsync_ingest::services::overrides::{self, OverrideTable};
use cupsync_ingest::services::player_client::PlayerClient;

#[derive(Parser)]
#[command(name = "cupsync-ingest", version, about = "Club cup campaign archive sync")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Archive file location (overrides the config value)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the campaigns listed in an ids file and merge them into the archive
    Sync {
        /// Newline-separated campaign ids, newest first
        #[arg(long, default_value = "campaign_ids.txt")]
        ids_file: PathBuf,

        /// Skip the override sheet even if one is configured
        #[arg(long)]
        no_overrides: bool,
    },
    /// Fetch one campaign and merge it under a fixed edition number
    Pin {
        /// Campaign id to fetch
        campaign_id: String,

        /// Edition number to archive it under
        #[arg(long)]
        edition: u32,
    },
    /// Re-apply the override sheet to every archived record (no campaign fetches)
    ApplyOverrides,
    /// Resolve outstanding author identifiers in the archive (no campaign fetches)
    Resolve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cupsync_ingest=info,cupsync_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("Starting cupsync-ingest v{}", env!("CARGO_PKG_VERSION"));

    let mut config = IngestConfig::load(cli.config.as_deref())?;
    if let Some(data_file) = cli.data_file {
        config.data_file = data_file;
    }
    info!(archive = %config.data_file.display(), club_id = %config.club_id, "Configuration resolved");

    match cli.command {
        Command::Sync {
            ids_file,
            no_overrides,
        } => run_sync(&config, &ids_file, no_overrides).await,
        Command::Pin {
            campaign_id,
            edition,
        } => run_pin(&config, &campaign_id, edition).await,
        Command::ApplyOverrides => run_apply_overrides(&config).await,
        Command::Resolve => run_resolve(&config).await,
    }
}

async fn run_sync(config: &IngestConfig, ids_file: &Path, no_overrides: bool) -> Result<()> {
    let candidate_ids = read_candidate_ids(ids_file)?;
    let mut records = store::load(&config.data_file)?;
    info!(
        candidates = candidate_ids.len(),
        archived = records.len(),
        "Inputs loaded"
    );

    let overrides = if no_overrides {
        OverrideTable::new()
    } else {
        load_overrides_lenient(config).await
    };

    let mut pipeline = SyncPipeline::new(CampaignClient::new(config)?, PlayerClient::new(config)?);
    let report = pipeline.run(&mut records, &candidate_ids, &overrides).await;

    store::save(&config.data_file, &mut records)?;

    info!(
        fetched = report.fetched,
        inserted = report.inserted,
        replaced = report.replaced,
        unchanged = report.unchanged,
        skipped = report.skipped,
        elapsed_secs = (report.finished_at - report.started_at).num_seconds(),
        "Sync finished"
    );
    if report.resolution_disabled {
        warn!(
            "Author resolution was shut down by a soft block; \
             refresh the session cookie and run `resolve`"
        );
    }
    if report.aborted {
        bail!("batch aborted by a soft block; work merged so far has been saved");
    }
    Ok(())
}

async fn run_pin(config: &IngestConfig, campaign_id: &str, edition: u32) -> Result<()> {
    let mut records = store::load(&config.data_file)?;
    let overrides = load_overrides_lenient(config).await;

    let mut pipeline = SyncPipeline::new(CampaignClient::new(config)?, PlayerClient::new(config)?);
    pipeline
        .pin(&mut records, campaign_id, edition, &overrides)
        .await?;

    store::save(&config.data_file, &mut records)?;
    info!(edition = edition, "Pinned edition archived");
    Ok(())
}

async fn run_apply_overrides(config: &IngestConfig) -> Result<()> {
    let Some(url) = &config.overrides_url else {
        bail!("no override sheet configured (overrides_url)");
    };

    let mut records = store::load(&config.data_file)?;
    let overrides = overrides::fetch_overrides(&sheet_client(config)?, url)
        .await
        .context("override sheet fetch failed")?;

    let changed = merge::apply_overrides_to_store(&mut records, &overrides);
    store::save(&config.data_file, &mut records)?;
    info!(changed = changed, "Override pass finished");
    Ok(())
}

async fn run_resolve(config: &IngestConfig) -> Result<()> {
    let mut records = store::load(&config.data_file)?;

    let mut resolver = AuthorResolver::new(PlayerClient::new(config)?);
    let resolved = resolver.resolve_all(&mut records).await;

    store::save(&config.data_file, &mut records)?;
    info!(resolved = resolved, "Resolve pass finished");

    if resolver.is_disabled() {
        bail!("resolution aborted by a soft block; resolved names have been saved");
    }
    Ok(())
}

/// Candidate ids, one per line. Blank lines are dropped here; duplicate
/// handling is the pipeline's job.
fn read_candidate_ids(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading candidate ids from {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// The override sheet is an enrichment source; a sync proceeds without it.
async fn load_overrides_lenient(config: &IngestConfig) -> OverrideTable {
    let Some(url) = &config.overrides_url else {
        info!("No override sheet configured");
        return OverrideTable::new();
    };
    let client = match sheet_client(config) {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %err, "Could not build the sheet HTTP client, proceeding without overrides");
            return OverrideTable::new();
        }
    };
    match overrides::fetch_overrides(&client, url).await {
        Ok(table) => table,
        Err(err) => {
            warn!(error = %err, "Override sheet unavailable, proceeding without overrides");
            OverrideTable::new()
        }
    }
}

/// Plain client for the sheet host. The session cookie stays on the API
/// host and is never sent here.
fn sheet_client(config: &IngestConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(30))
        .build()
        .context("sheet HTTP client build failed")
}
