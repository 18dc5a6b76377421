//! Clinic Harvester CLI
//!
//! Local execution entry point for the harvest, grouping and enrichment passes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use clinic_harvester::{
    error::Result,
    models::{Config, EnrichedAddress, GroupedAddress, HarvestState, HarvestSummary, OutputRow},
    pipeline,
    services::GooglePlacesClient,
    storage::{count_rows, read_csv},
    utils::http,
};

/// Ontario dentist and clinic harvester
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Harvest Ontario dentists and their practice locations"
)]
struct Cli {
    /// Path to storage directory containing config and output files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the registry and write the dentist/clinic snapshot
    Harvest,

    /// Group the harvested rows by address
    Group,

    /// Look up places data for every grouped address
    Enrich,

    /// Run full pipeline: Harvest → Group (→ Enrich)
    Pipeline {
        /// Also run the enrichment pass
        #[arg(long)]
        enrich: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Show current output info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn log_summary(summary: &HarvestSummary) {
    let elapsed = summary.end_time - summary.start_time;
    log::info!(
        "Harvest finished in {}s: {} found, {} skipped, {} dispatched, {} failed",
        elapsed.num_seconds(),
        summary.records_found,
        summary.records_skipped,
        summary.records_dispatched,
        summary.records_failed
    );
    log::info!(
        "{} new rows, {} rows persisted",
        summary.rows_produced,
        summary.rows_persisted
    );
}

async fn enrich(config: &Config, root: &Path) -> Result<()> {
    let api_key = config.places.resolve_api_key()?;
    let client = http::create_async_client(&config.places)?;
    let lookup = GooglePlacesClient::new(client, config.places.clone(), api_key);

    let located = pipeline::run_enrichment(
        &lookup,
        &config.paths.grouped_path(root),
        &config.paths.enriched_path(root),
        Duration::from_millis(config.places.request_delay_ms),
    )
    .await?;
    log::info!("{located} addresses located");
    Ok(())
}

async fn group(config: &Config, root: &Path) -> Result<()> {
    pipeline::run_grouping(&config.paths.output_path(root), &config.paths.grouped_path(root))
        .await?;
    Ok(())
}

async fn describe(path: &Path, label: &str) -> Result<()> {
    match read_csv::<OutputRow>(path).await? {
        Some(rows) => {
            let state = HarvestState::from_rows(&rows);
            log::info!(
                "{label}: {} rows, {} dentists ({})",
                rows.len(),
                state.len(),
                path.display()
            );
        }
        None => log::info!("{label}: not found"),
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Clinic harvester starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    config.validate()?;

    log::info!("Loaded configuration from {}", cli.storage_dir.display());
    let root = cli.storage_dir.as_path();

    match cli.command {
        Command::Harvest => {
            let summary = pipeline::run_harvest(&config, root).await?;
            log_summary(&summary);
        }

        Command::Group => group(&config, root).await?,

        Command::Enrich => enrich(&config, root).await?,

        Command::Pipeline { enrich: with_enrich } => {
            let steps = if with_enrich { 3 } else { 2 };

            log::info!("Step 1/{steps}: Harvesting dentists and clinics...");
            let summary = pipeline::run_harvest(&config, root).await?;
            log_summary(&summary);

            log::info!("Step 2/{steps}: Grouping by address...");
            group(&config, root).await?;

            if with_enrich {
                log::info!("Step 3/{steps}: Fetching places details...");
                enrich(&config, root).await?;
            }

            log::info!("Pipeline complete!");
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK ({})", config_path.display());
            match config.places.resolve_api_key() {
                Ok(_) => log::info!("✓ Places API key available"),
                Err(e) => log::warn!("Enrichment unavailable: {e}"),
            }
            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", root.display());
            describe(&config.paths.checkpoint_path(root), "Checkpoint").await?;
            describe(&config.paths.output_path(root), "Output").await?;

            let grouped = count_rows::<GroupedAddress>(&config.paths.grouped_path(root)).await?;
            let enriched = count_rows::<EnrichedAddress>(&config.paths.enriched_path(root)).await?;
            for (label, count) in [("Grouped", grouped), ("Enriched", enriched)] {
                match count {
                    Some(count) => log::info!("{label}: {count} addresses"),
                    None => log::info!("{label}: not found"),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
