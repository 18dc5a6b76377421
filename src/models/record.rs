// src/models/record.rs

//! Harvested record structures.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Address placeholder when a detail page has no practice section.
pub const NOT_AVAILABLE: &str = "N/A";

/// Address placeholder when a practice row has no address block.
pub const UNKNOWN_ADDRESS: &str = "Unknown Address";

/// Location placeholder when the detail page could not be rendered.
pub const NO_CLINICS_FOUND: &str = "No clinics found";

/// A professional found on the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReference {
    /// Trimmed name as rendered on the listing; also the checkpoint key
    pub display_name: String,

    /// Absolute URL of the profile page
    pub detail_url: String,
}

/// A practice location found on a profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRecord {
    pub location_name: String,
    pub address: String,
}

impl SubRecord {
    /// Fallback for a profile page without a practice section.
    pub fn owner_fallback(owner_name: &str) -> Self {
        Self {
            location_name: owner_name.to_string(),
            address: NOT_AVAILABLE.to_string(),
        }
    }
}

/// One persisted row: a practice location flattened with its owner's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "Dentist Name")]
    pub owner_name: String,

    #[serde(rename = "Clinic Name")]
    pub location_name: String,

    #[serde(rename = "Address")]
    pub address: String,
}

impl OutputRow {
    /// CSV header of the harvest snapshot.
    pub const HEADERS: [&'static str; 3] = ["Dentist Name", "Clinic Name", "Address"];

    pub fn new(owner_name: &str, sub_record: SubRecord) -> Self {
        Self {
            owner_name: owner_name.to_string(),
            location_name: sub_record.location_name,
            address: sub_record.address,
        }
    }

    /// Sentinel row for a record whose profile yielded no locations.
    pub fn no_clinics(owner_name: &str) -> Self {
        Self {
            owner_name: owner_name.to_string(),
            location_name: NO_CLINICS_FOUND.to_string(),
            address: NOT_AVAILABLE.to_string(),
        }
    }

    /// Flatten a record's locations into rows, never returning an empty set.
    pub fn for_owner(owner_name: &str, sub_records: Vec<SubRecord>) -> Vec<Self> {
        if sub_records.is_empty() {
            return vec![Self::no_clinics(owner_name)];
        }
        sub_records
            .into_iter()
            .map(|sub| Self::new(owner_name, sub))
            .collect()
    }
}

/// Which records are already harvested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestState {
    completed_owner_names: HashSet<String>,
}

impl HarvestState {
    /// Rebuild state from a persisted snapshot.
    pub fn from_rows(rows: &[OutputRow]) -> Self {
        Self {
            completed_owner_names: rows.iter().map(|r| r.owner_name.clone()).collect(),
        }
    }

    pub fn is_completed(&self, display_name: &str) -> bool {
        self.completed_owner_names.contains(display_name)
    }

    pub fn mark_completed(&mut self, display_name: impl Into<String>) {
        self.completed_owner_names.insert(display_name.into());
    }

    pub fn len(&self) -> usize {
        self.completed_owner_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed_owner_names.is_empty()
    }

    pub fn into_names(self) -> HashSet<String> {
        self.completed_owner_names
    }
}
