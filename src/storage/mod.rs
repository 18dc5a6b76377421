//! Storage abstractions for harvest snapshots.
//!
//! A snapshot is the full set of harvested rows, overwritten on every
//! persistence event. The checkpoint copy is read back at startup to skip
//! records that are already done.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml                                  # Harvester configuration
//! ├── ontario_dentists_with_clinics_partial.csv    # Checkpoint snapshot
//! ├── ontario_dentists_with_clinics.csv            # Harvest output
//! ├── ontario_dentists_cleaned_and_grouped.csv     # Grouping pass output
//! └── clinics_with_details.csv                     # Enrichment pass output
//! ```

pub mod local;

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{HarvestState, OutputRow};

// Re-export for convenience
pub use local::{CsvStorage, count_rows, read_csv, write_csv};

/// Trait for harvest snapshot backends.
#[async_trait]
pub trait RowStorage: Send + Sync {
    /// Overwrite the stored snapshot with `rows`.
    async fn write_snapshot(&self, rows: &[OutputRow]) -> Result<()>;

    /// Load the last stored snapshot; empty when none exists yet.
    async fn load_rows(&self) -> Result<Vec<OutputRow>>;

    /// Owner names present in the last stored snapshot.
    async fn load_completed(&self) -> Result<HashSet<String>> {
        let rows = self.load_rows().await?;
        Ok(HarvestState::from_rows(&rows).into_names())
    }
}

/// Read the owner names already harvested into the snapshot at `path`.
///
/// A missing file means a cold start and yields an empty set.
pub async fn load_completed(path: &Path) -> Result<HashSet<String>> {
    let rows: Vec<OutputRow> = read_csv(path).await?.unwrap_or_default();
    Ok(HarvestState::from_rows(&rows).into_names())
}
