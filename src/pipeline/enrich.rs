// src/pipeline/enrich.rs

//! Enrichment pass: coordinates and contact details per grouped address.

use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{EnrichedAddress, GroupedAddress};
use crate::services::PlacesLookup;
use crate::storage::{read_csv, write_csv};

/// Keep the street and city parts of an address; None for blank input.
pub fn sanitize_address(address: &str) -> Option<String> {
    if address.trim().is_empty() {
        return None;
    }
    let simplified = address
        .split(',')
        .take(2)
        .collect::<Vec<_>>()
        .join(",")
        .trim()
        .to_string();
    Some(simplified)
}

/// Look up one grouped address, leaving columns empty when nothing is found.
async fn enrich_one(lookup: &dyn PlacesLookup, group: GroupedAddress) -> EnrichedAddress {
    let mut enriched = EnrichedAddress::from(group);

    let Some(query) = sanitize_address(&enriched.address) else {
        log::warn!("Skipping invalid address: {:?}", enriched.address);
        return enriched;
    };

    log::info!("Fetching Place ID for: {query}");
    let candidate = match lookup.find_place(&query).await {
        Ok(Some(candidate)) => candidate,
        Ok(None) => return enriched,
        Err(e) => {
            log::warn!("Place lookup failed for {query}: {e}");
            return enriched;
        }
    };
    enriched.apply_candidate(&candidate);

    log::info!("Fetching details for Place ID: {}", candidate.place_id);
    match lookup.place_details(&candidate.place_id).await {
        Ok(details) => enriched.apply_details(details),
        Err(e) => log::warn!("Details lookup failed for {}: {e}", candidate.place_id),
    }
    enriched
}

/// Enrich every grouped address in order, pausing `delay` between lookups.
pub async fn enrich_addresses(
    lookup: &dyn PlacesLookup,
    groups: Vec<GroupedAddress>,
    delay: Duration,
) -> Vec<EnrichedAddress> {
    let mut enriched = Vec::with_capacity(groups.len());
    for group in groups {
        let attempted = sanitize_address(&group.address).is_some();
        enriched.push(enrich_one(lookup, group).await);
        if attempted && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    enriched
}

/// Read the grouped file, enrich it, and write the enriched file.
///
/// Returns the number of rows that received coordinates.
pub async fn run_enrichment(
    lookup: &dyn PlacesLookup,
    input: &Path,
    output: &Path,
    delay: Duration,
) -> Result<usize> {
    let groups: Vec<GroupedAddress> = read_csv(input)
        .await?
        .ok_or_else(|| AppError::config(format!("Grouped file not found at {}", input.display())))?;
    log::info!("Enriching {} grouped addresses", groups.len());

    let enriched = enrich_addresses(lookup, groups, delay).await;
    let located = enriched.iter().filter(|r| r.latitude.is_some()).count();

    write_csv(output, &EnrichedAddress::HEADERS, &enriched).await?;
    log::info!(
        "Details fetching completed. Results saved to {} ({located}/{} located).",
        output.display(),
        enriched.len()
    );
    Ok(located)
}
