// src/models/selectors.rs

//! CSS selectors for scraping the registry's listing and profile pages.

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// CSS selectors for the registry pages, as written in config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSelectors {
    /// Landmark whose presence means the page finished rendering
    #[serde(default = "defaults::ready")]
    pub ready: String,

    /// Anchor of each professional on the listing page
    #[serde(default = "defaults::listing_anchor")]
    pub listing_anchor: String,

    /// Section holding all practice locations on a profile page
    #[serde(default = "defaults::practice_section")]
    pub practice_section: String,

    /// Each location row within the practice section
    #[serde(default = "defaults::practice_row")]
    pub practice_row: String,

    /// Location name heading within a row
    #[serde(default = "defaults::practice_name")]
    pub practice_name: String,

    /// Address block within a row
    #[serde(default = "defaults::address_block")]
    pub address_block: String,

    /// Each address line within the address block
    #[serde(default = "defaults::address_line")]
    pub address_line: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            ready: defaults::ready(),
            listing_anchor: defaults::listing_anchor(),
            practice_section: defaults::practice_section(),
            practice_row: defaults::practice_row(),
            practice_name: defaults::practice_name(),
            address_block: defaults::address_block(),
            address_line: defaults::address_line(),
        }
    }
}

impl PageSelectors {
    /// Parse every selector, failing on the first invalid one.
    pub fn compile(&self) -> Result<CompiledSelectors> {
        Ok(CompiledSelectors {
            listing_anchor: parse_selector(&self.listing_anchor)?,
            practice_section: parse_selector(&self.practice_section)?,
            practice_row: parse_selector(&self.practice_row)?,
            practice_name: parse_selector(&self.practice_name)?,
            address_block: parse_selector(&self.address_block)?,
            address_line: parse_selector(&self.address_line)?,
        })
    }
}

/// Parsed selectors shared by the extractors.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub listing_anchor: Selector,
    pub practice_section: Selector,
    pub practice_row: Selector,
    pub practice_name: Selector,
    pub address_block: Selector,
    pub address_line: Selector,
}

/// Parse a single CSS selector.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

mod defaults {
    pub fn ready() -> String {
        "main".into()
    }
    pub fn listing_anchor() -> String {
        "section.row h2 a".into()
    }
    pub fn practice_section() -> String {
        "section#OtherPractices".into()
    }
    pub fn practice_row() -> String {
        "li.row".into()
    }
    pub fn practice_name() -> String {
        "h6.col-12".into()
    }
    pub fn address_block() -> String {
        "address".into()
    }
    pub fn address_line() -> String {
        "span".into()
    }
}
