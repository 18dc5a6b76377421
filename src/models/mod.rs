// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod address;
mod config;
mod record;
mod selectors;

// Re-export all public types
pub use address::{EnrichedAddress, GroupedAddress, PlaceCandidate, PlaceDetails};
pub use config::{
    Config, HarvestConfig, PLACES_API_KEY_ENV, PathsConfig, PlacesConfig, RendererConfig,
};
pub use record::{
    HarvestState, NO_CLINICS_FOUND, NOT_AVAILABLE, OutputRow, RecordReference, SubRecord,
    UNKNOWN_ADDRESS,
};
pub use selectors::{CompiledSelectors, PageSelectors, parse_selector};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Totals reported when a harvest run finishes.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// References found on the listing page
    pub records_found: usize,
    /// References skipped because the checkpoint already had them
    pub records_skipped: usize,
    /// References sent to the worker pool
    pub records_dispatched: usize,
    /// Dispatched references whose harvest failed
    pub records_failed: usize,
    /// Rows produced during this run
    pub rows_produced: usize,
    /// Rows in the final snapshot, including rows carried over from the checkpoint
    pub rows_persisted: usize,
}
