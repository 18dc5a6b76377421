//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Page rendering (`PageRenderer`, `ChromeRenderer`)
//! - Listing extraction (`extract_listing`)
//! - Profile extraction (`extract_sub_records`)
//! - Places lookups (`PlacesLookup`, `GooglePlacesClient`)

#[cfg(feature = "chrome")]
mod chrome;
mod detail;
mod listing;
mod places;
mod renderer;

#[cfg(feature = "chrome")]
pub use chrome::ChromeRenderer;
pub use detail::{address_or_unknown, extract_sub_records, location_name_or_owner};
pub use listing::extract_listing;
pub use places::{GooglePlacesClient, PlacesLookup, RetryDecision, backoff_delay};
pub use renderer::{PageRenderer, RenderCause, RenderFailure};
