// src/services/places.rs

//! Places API client used by the enrichment pass.
//!
//! Lookups go through two endpoints: find-place-from-text for a place id and
//! coordinates, then place details for contact metadata. Rate limiting
//! (HTTP 429) is retried with exponential backoff; any other non-200 status
//! gives up on the request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{PlaceCandidate, PlaceDetails, PlacesConfig};

/// Fields requested from find-place-from-text.
const FIND_PLACE_FIELDS: &str = "place_id,geometry";

/// Fields requested from place details.
const DETAILS_FIELDS: &str = "name,formatted_phone_number,website,opening_hours";

/// Provider seam for place lookups.
#[async_trait]
pub trait PlacesLookup: Send + Sync {
    /// Find the best candidate for a free-text address.
    async fn find_place(&self, address: &str) -> Result<Option<PlaceCandidate>>;

    /// Fetch contact metadata for a place id.
    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails>;
}

/// What to do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Accept,
    Retry,
    GiveUp,
}

impl RetryDecision {
    pub fn for_status(status: StatusCode) -> Self {
        match status {
            StatusCode::OK => Self::Accept,
            StatusCode::TOO_MANY_REQUESTS => Self::Retry,
            _ => Self::GiveUp,
        }
    }
}

/// Backoff before retry number `attempt` (zero-based), doubling each time.
pub fn backoff_delay(initial_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(initial_ms.saturating_mul(1u64 << attempt.min(16)))
}

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    status: String,
    #[serde(default)]
    candidates: Vec<CandidateJson>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateJson {
    place_id: String,
    geometry: GeometryJson,
}

#[derive(Debug, Deserialize)]
struct GeometryJson {
    location: LatLngJson,
}

#[derive(Debug, Deserialize)]
struct LatLngJson {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<DetailsJson>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsJson {
    #[serde(default)]
    formatted_phone_number: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    opening_hours: Option<OpeningHoursJson>,
}

#[derive(Debug, Deserialize)]
struct OpeningHoursJson {
    #[serde(default)]
    weekday_text: Option<Vec<String>>,
}

/// Status returned when a request is valid but nothing matched.
const ZERO_RESULTS: &str = "ZERO_RESULTS";

/// Statuses other than OK or ZERO_RESULTS mean the request itself was refused.
fn status_error(status: &str, error_message: Option<String>, target: &str) -> AppError {
    AppError::places(format!(
        "{target}: status {status}{}",
        error_message
            .map(|m| format!(", Error Message: {m}"))
            .unwrap_or_default()
    ))
}

fn candidate_from(response: FindPlaceResponse, address: &str) -> Result<Option<PlaceCandidate>> {
    match response.status.as_str() {
        "OK" => {}
        ZERO_RESULTS => {
            log::warn!("Failed to find place: {address}, Status: {ZERO_RESULTS}");
            return Ok(None);
        }
        status => return Err(status_error(status, response.error_message, address)),
    }
    Ok(response
        .candidates
        .into_iter()
        .next()
        .map(|c| PlaceCandidate {
            place_id: c.place_id,
            latitude: c.geometry.location.lat,
            longitude: c.geometry.location.lng,
        }))
}

fn details_from(response: DetailsResponse, place_id: &str) -> Result<PlaceDetails> {
    match response.status.as_str() {
        "OK" => {}
        ZERO_RESULTS | "NOT_FOUND" => {
            log::warn!(
                "Failed to fetch details for place_id: {place_id}, Status: {}",
                response.status
            );
            return Ok(PlaceDetails::default());
        }
        status => return Err(status_error(status, response.error_message, place_id)),
    }
    Ok(response
        .result
        .map(|r| PlaceDetails {
            phone: r.formatted_phone_number,
            website: r.website,
            weekday_hours: r.opening_hours.and_then(|h| h.weekday_text),
        })
        .unwrap_or_default())
}

/// Google Places web service client.
pub struct GooglePlacesClient {
    client: Client,
    config: PlacesConfig,
    api_key: String,
}

impl GooglePlacesClient {
    pub fn new(client: Client, config: PlacesConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            config,
            api_key: api_key.into(),
        }
    }

    /// GET with backoff on rate limiting; None when the request gave up.
    async fn get_with_backoff(&self, url: &str, params: &[(&str, &str)]) -> Result<Option<Response>> {
        for attempt in 0..self.config.max_attempts {
            let response = self
                .client
                .get(url)
                .query(params)
                .query(&[("key", self.api_key.as_str())])
                .send()
                .await?;

            match RetryDecision::for_status(response.status()) {
                RetryDecision::Accept => return Ok(Some(response)),
                RetryDecision::Retry => {
                    let delay = backoff_delay(self.config.initial_backoff_ms, attempt);
                    log::warn!(
                        "Rate limit exceeded. Retrying in {:.1} seconds...",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    log::warn!("Places request to {url} failed with {}", response.status());
                    return Ok(None);
                }
            }
        }
        log::warn!(
            "Places request to {url} still rate limited after {} attempts",
            self.config.max_attempts
        );
        Ok(None)
    }
}

#[async_trait]
impl PlacesLookup for GooglePlacesClient {
    async fn find_place(&self, address: &str) -> Result<Option<PlaceCandidate>> {
        let params = [
            ("input", address),
            ("inputtype", "textquery"),
            ("fields", FIND_PLACE_FIELDS),
        ];
        let Some(response) = self
            .get_with_backoff(&self.config.find_place_url, &params)
            .await?
        else {
            return Ok(None);
        };
        let body: FindPlaceResponse = serde_json::from_slice(&response.bytes().await?)?;
        candidate_from(body, address)
    }

    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails> {
        let params = [("place_id", place_id), ("fields", DETAILS_FIELDS)];
        let Some(response) = self
            .get_with_backoff(&self.config.details_url, &params)
            .await?
        else {
            return Ok(PlaceDetails::default());
        };
        let body: DetailsResponse = serde_json::from_slice(&response.bytes().await?)?;
        details_from(body, place_id)
    }
}
