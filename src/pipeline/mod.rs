//! Pipeline entry points for harvester operations.
//!
//! - `run_harvest`: Render the registry and write the dentist/clinic snapshot
//! - `run_grouping`: Collapse the snapshot into one row per address
//! - `run_enrichment`: Attach places data to every grouped address

pub mod collector;
pub mod enrich;
pub mod group;
pub mod harvest;

pub use collector::{Collector, CollectorReport, Completion};
pub use enrich::{enrich_addresses, run_enrichment, sanitize_address};
pub use group::{group_rows, run_grouping};
pub use harvest::{HarvestPhase, Harvester, pending_references};

#[cfg(feature = "chrome")]
use std::path::Path;
#[cfg(feature = "chrome")]
use std::sync::Arc;

#[cfg(feature = "chrome")]
use crate::{
    error::Result,
    models::{Config, HarvestSummary},
    services::ChromeRenderer,
    storage::CsvStorage,
};

/// Harvest with a headless Chromium renderer and CSV snapshots under `root`.
#[cfg(feature = "chrome")]
pub async fn run_harvest(config: &Config, root: &Path) -> Result<HarvestSummary> {
    let renderer = Arc::new(ChromeRenderer::new(config));
    let storage = Arc::new(CsvStorage::from_paths(&config.paths, root));
    let harvester = Harvester::new(config, renderer, storage)?;
    harvester.run().await
}
