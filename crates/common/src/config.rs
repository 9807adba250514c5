//! Advisor configuration types.

use serde::{Deserialize, Serialize};

/// Top-level advisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API key. Only required for advisory generation.
    #[serde(default)]
    pub gemini_api_key: String,

    /// External endpoints.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Generative model settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Pollutant fetch settings.
    #[serde(default)]
    pub air_quality: AirQualityConfig,

    /// Local result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Health profile source.
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// Base URLs of the third-party APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_geolocation_url")]
    pub geolocation_url: String,
    #[serde(default = "default_air_quality_url")]
    pub air_quality_url: String,
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    #[serde(default = "default_generative_base_url")]
    pub generative_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifiers, tried strictly in order.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Per-attempt request timeout.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQualityConfig {
    /// Client-side timeout for the pollutant fetch.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_ms: u64,

    /// Timezone passed to the pollutant API.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// JSON file backing the local key-value store.
    #[serde(default = "default_cache_path")]
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Whose conditions to consult. Unset means no conditions.
    #[serde(default)]
    pub user_id: Option<String>,

    /// JSON file listing health conditions.
    #[serde(default)]
    pub conditions_path: Option<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_geolocation_url() -> String {
    "https://ipwho.is/".into()
}
fn default_air_quality_url() -> String {
    "https://air-quality-api.open-meteo.com/v1/air-quality".into()
}
fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".into()
}
fn default_generative_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

pub fn default_models() -> Vec<String> {
    [
        "gemini-2.5-flash",
        "gemini-2.5-flash-lite",
        "gemini-2.0-flash",
        "gemini-2.0-flash-lite",
        "gemma-3-27b-it",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}
fn default_generation_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    15_000
}
fn default_timezone() -> String {
    "auto".into()
}

fn default_cache_path() -> String {
    ".aqi-advisor/cache.json".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            endpoints: EndpointsConfig::default(),
            generation: GenerationConfig::default(),
            air_quality: AirQualityConfig::default(),
            cache: CacheConfig::default(),
            profile: ProfileConfig::default(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            geolocation_url: default_geolocation_url(),
            air_quality_url: default_air_quality_url(),
            geocoding_url: default_geocoding_url(),
            generative_base_url: default_generative_base_url(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for AirQualityConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_fetch_timeout(),
            timezone: default_timezone(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}
