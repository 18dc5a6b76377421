//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::PageSelectors;

/// Environment variable consulted when `places.api_key` is unset.
pub const PLACES_API_KEY_ENV: &str = "PLACES_API_KEY";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Listing source and worker pool settings
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Headless browser settings
    #[serde(default)]
    pub browser: RendererConfig,

    /// CSS selectors for the registry pages
    #[serde(default)]
    pub selectors: PageSelectors,

    /// Output file locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Places API settings for enrichment
    #[serde(default)]
    pub places: PlacesConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.listing_url.trim().is_empty() {
            return Err(AppError::validation("harvest.listing_url is empty"));
        }
        url::Url::parse(&self.harvest.base_url)
            .map_err(|e| AppError::validation(format!("harvest.base_url is invalid: {e}")))?;
        if self.harvest.pool_size == 0 {
            return Err(AppError::validation("harvest.pool_size must be > 0"));
        }
        if self.harvest.persist_every == 0 {
            return Err(AppError::validation("harvest.persist_every must be > 0"));
        }
        if self.harvest.render_timeout_secs == 0 {
            return Err(AppError::validation(
                "harvest.render_timeout_secs must be > 0",
            ));
        }
        if self.harvest.record_timeout_secs < self.harvest.render_timeout_secs {
            return Err(AppError::validation(
                "harvest.record_timeout_secs must be >= harvest.render_timeout_secs",
            ));
        }
        if self.places.max_attempts == 0 {
            return Err(AppError::validation("places.max_attempts must be > 0"));
        }
        self.selectors.compile()?;
        Ok(())
    }
}

/// Listing source and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Search results page listing every registered dentist
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,

    /// Origin that relative profile links resolve against
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Maximum concurrently harvested records
    #[serde(default = "defaults::pool_size")]
    pub pool_size: usize,

    /// Persist a snapshot every N completed records
    #[serde(default = "defaults::persist_every")]
    pub persist_every: usize,

    /// Wait bound for the readiness landmark, in seconds
    #[serde(default = "defaults::render_timeout")]
    pub render_timeout_secs: u64,

    /// Upper bound for one record's whole harvest, in seconds
    #[serde(default = "defaults::record_timeout")]
    pub record_timeout_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            listing_url: defaults::listing_url(),
            base_url: defaults::base_url(),
            pool_size: defaults::pool_size(),
            persist_every: defaults::persist_every(),
            render_timeout_secs: defaults::render_timeout(),
            record_timeout_secs: defaults::record_timeout(),
        }
    }
}

/// Headless browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Explicit Chrome/Chromium binary; auto-detected when unset
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    #[serde(default = "defaults::headless")]
    pub headless: bool,

    #[serde(default = "defaults::no_sandbox")]
    pub no_sandbox: bool,

    #[serde(default = "defaults::window_width")]
    pub window_width: u32,

    #[serde(default = "defaults::window_height")]
    pub window_height: u32,

    /// Extra command-line switches passed to the browser
    #[serde(default = "defaults::browser_args")]
    pub args: Vec<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: defaults::headless(),
            no_sandbox: defaults::no_sandbox(),
            window_width: defaults::window_width(),
            window_height: defaults::window_height(),
            args: defaults::browser_args(),
        }
    }
}

/// Output file names, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Snapshot read back at startup to skip finished records
    #[serde(default = "defaults::checkpoint_file")]
    pub checkpoint_file: String,

    /// Harvest output
    #[serde(default = "defaults::output_file")]
    pub output_file: String,

    /// Grouping pass output
    #[serde(default = "defaults::grouped_file")]
    pub grouped_file: String,

    /// Enrichment pass output
    #[serde(default = "defaults::enriched_file")]
    pub enriched_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            checkpoint_file: defaults::checkpoint_file(),
            output_file: defaults::output_file(),
            grouped_file: defaults::grouped_file(),
            enriched_file: defaults::enriched_file(),
        }
    }
}

impl PathsConfig {
    pub fn checkpoint_path(&self, root: &Path) -> PathBuf {
        root.join(&self.checkpoint_file)
    }

    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(&self.output_file)
    }

    pub fn grouped_path(&self, root: &Path) -> PathBuf {
        root.join(&self.grouped_file)
    }

    pub fn enriched_path(&self, root: &Path) -> PathBuf {
        root.join(&self.enriched_file)
    }
}

/// Places API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    /// API key; falls back to the `PLACES_API_KEY` environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "defaults::find_place_url")]
    pub find_place_url: String,

    #[serde(default = "defaults::details_url")]
    pub details_url: String,

    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    #[serde(default = "defaults::places_timeout")]
    pub timeout_secs: u64,

    /// Attempts per request when rate limited
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// First rate-limit backoff, doubled on each retry
    #[serde(default = "defaults::initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Pause between addresses
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            find_place_url: defaults::find_place_url(),
            details_url: defaults::details_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::places_timeout(),
            max_attempts: defaults::max_attempts(),
            initial_backoff_ms: defaults::initial_backoff(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

impl PlacesConfig {
    /// Resolve the API key from config, then from the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(PLACES_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "places.api_key is not set and {PLACES_API_KEY_ENV} is empty"
                ))
            })
    }
}

mod defaults {
    // Harvest defaults
    pub fn listing_url() -> String {
        "https://www.rcdso.org/find-a-dentist/search-results?Alpha=&City=&MbrSpecialty=&ConstitID=&District=&AlphaParent=&Address1=&PhoneNum=&SedationType=&SedationProviderType=&GroupCode=&DetailsCode=".into()
    }
    pub fn base_url() -> String {
        "https://www.rcdso.org".into()
    }
    pub fn pool_size() -> usize {
        5
    }
    pub fn persist_every() -> usize {
        10
    }
    pub fn render_timeout() -> u64 {
        20
    }
    pub fn record_timeout() -> u64 {
        90
    }

    // Browser defaults
    pub fn headless() -> bool {
        true
    }
    pub fn no_sandbox() -> bool {
        true
    }
    pub fn window_width() -> u32 {
        1920
    }
    pub fn window_height() -> u32 {
        1080
    }
    pub fn browser_args() -> Vec<String> {
        vec![
            "--disable-gpu".into(),
            "--disable-dev-shm-usage".into(),
            "--log-level=3".into(),
        ]
    }

    // Path defaults
    pub fn checkpoint_file() -> String {
        "ontario_dentists_with_clinics_partial.csv".into()
    }
    pub fn output_file() -> String {
        "ontario_dentists_with_clinics.csv".into()
    }
    pub fn grouped_file() -> String {
        "ontario_dentists_cleaned_and_grouped.csv".into()
    }
    pub fn enriched_file() -> String {
        "clinics_with_details.csv".into()
    }

    // Places defaults
    pub fn find_place_url() -> String {
        "https://maps.googleapis.com/maps/api/place/findplacefromtext/json".into()
    }
    pub fn details_url() -> String {
        "https://maps.googleapis.com/maps/api/place/details/json".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; clinic-harvester/0.1)".into()
    }
    pub fn places_timeout() -> u64 {
        30
    }
    pub fn max_attempts() -> u32 {
        5
    }
    pub fn initial_backoff() -> u64 {
        1000
    }
    pub fn request_delay() -> u64 {
        1000
    }
}
