// src/services/detail.rs

//! Profile page extraction.
//!
//! Structural drift on the registry must never abort a run, so every missing
//! element degrades to a named fallback instead of an error.

use scraper::{ElementRef, Html, Selector};

use crate::models::{CompiledSelectors, SubRecord, UNKNOWN_ADDRESS};
use crate::utils::normalize_whitespace;

/// Extract the practice locations listed on a rendered profile page.
///
/// Without a practice section the owner yields one `N/A` location named
/// after themselves.
pub fn extract_sub_records(
    html: &str,
    owner_name: &str,
    selectors: &CompiledSelectors,
) -> Vec<SubRecord> {
    let document = Html::parse_document(html);

    let Some(section) = document.select(&selectors.practice_section).next() else {
        log::info!("No practice section found for {owner_name}. Using owner name as location.");
        return vec![SubRecord::owner_fallback(owner_name)];
    };

    section
        .select(&selectors.practice_row)
        .map(|row| {
            let record = SubRecord {
                location_name: location_name_or_owner(&row, &selectors.practice_name, owner_name),
                address: address_or_unknown(
                    &row,
                    &selectors.address_block,
                    &selectors.address_line,
                ),
            };
            log::debug!(
                "Extracted location for {owner_name}: {} / {}",
                record.location_name,
                record.address
            );
            record
        })
        .collect()
}

/// Heading text of the row, or the owner's name when it is missing or blank.
pub fn location_name_or_owner(row: &ElementRef<'_>, name_sel: &Selector, owner_name: &str) -> String {
    row.select(name_sel)
        .next()
        .map(|heading| normalize_whitespace(&heading.text().collect::<String>()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| owner_name.to_string())
}

/// Comma-joined address lines of the row, or `Unknown Address` without a block.
///
/// Lines that are empty after whitespace normalization are dropped before
/// joining, so a blank `span` never leaves a `", ,"` gap in the address.
pub fn address_or_unknown(row: &ElementRef<'_>, block_sel: &Selector, line_sel: &Selector) -> String {
    let Some(block) = row.select(block_sel).next() else {
        return UNKNOWN_ADDRESS.to_string();
    };

    block
        .select(line_sel)
        .map(|line| normalize_whitespace(&line.text().collect::<String>()))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
