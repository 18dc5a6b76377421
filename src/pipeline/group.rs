// src/pipeline/group.rs

//! Grouping pass: one row per distinct address.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{GroupedAddress, NOT_AVAILABLE, OutputRow};
use crate::storage::{read_csv, write_csv};

/// Separator between names sharing an address.
const NAME_SEPARATOR: &str = ", ";

#[derive(Default)]
struct Names {
    owners: Vec<String>,
    locations: Vec<String>,
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// Group harvested rows by exact address, sorted by address.
///
/// Rows without an address (`N/A` or blank) are dropped. Names keep the order
/// in which they were first seen.
pub fn group_rows(rows: &[OutputRow]) -> Vec<GroupedAddress> {
    let mut groups: BTreeMap<&str, Names> = BTreeMap::new();

    for row in rows {
        let address = row.address.trim();
        if address.is_empty() || address == NOT_AVAILABLE {
            continue;
        }
        let names = groups.entry(address).or_default();
        push_unique(&mut names.owners, &row.owner_name);
        push_unique(&mut names.locations, &row.location_name);
    }

    groups
        .into_iter()
        .map(|(address, names)| GroupedAddress {
            address: address.to_string(),
            owner_names: names.owners.join(NAME_SEPARATOR),
            location_names: names.locations.join(NAME_SEPARATOR),
        })
        .collect()
}

/// Read a harvest snapshot, group it, and write the grouped file.
///
/// Returns the number of grouped addresses written.
pub async fn run_grouping(input: &Path, output: &Path) -> Result<usize> {
    let rows: Vec<OutputRow> = read_csv(input)
        .await?
        .ok_or_else(|| AppError::config(format!("Harvest output not found at {}", input.display())))?;

    let kept = rows
        .iter()
        .filter(|r| r.address.trim() != NOT_AVAILABLE && !r.address.trim().is_empty())
        .count();
    log::info!("Removed rows with 'N/A' addresses. Remaining rows: {kept}");

    let grouped = group_rows(&rows);
    write_csv(output, &GroupedAddress::HEADERS, &grouped).await?;
    log::info!(
        "Cleaned and grouped CSV saved to {} ({} addresses).",
        output.display(),
        grouped.len()
    );
    Ok(grouped.len())
}
