//! Configuration loader: merges env vars, .env file, and config.toml.

use common::{AppConfig, Error};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "config.toml";

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.generation.models.is_empty() {
        issues.push("generation.models must contain at least one model".into());
    }
    if config.generation.models.iter().any(|m| m.trim().is_empty()) {
        issues.push("generation.models must not contain empty ids".into());
    }
    if config.generation.timeout_secs == 0 {
        issues.push("generation.timeout_secs must be > 0".into());
    }
    if config.air_quality.timeout_ms == 0 {
        issues.push("air_quality.timeout_ms must be > 0".into());
    }
    if config.air_quality.timezone.trim().is_empty() {
        issues.push("air_quality.timezone must not be empty".into());
    }
    if config.cache.path.trim().is_empty() {
        issues.push("cache.path must not be empty".into());
    }

    let endpoints = &config.endpoints;
    for (name, url) in [
        ("geolocation_url", &endpoints.geolocation_url),
        ("air_quality_url", &endpoints.air_quality_url),
        ("geocoding_url", &endpoints.geocoding_url),
        ("generative_base_url", &endpoints.generative_base_url),
    ] {
        if !is_http_url(url) {
            issues.push(format!("endpoints.{name} must be an http(s) URL"));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply environment overrides using `lookup` to read variables.
fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(key) = lookup("GEMINI_API_KEY") {
        config.gemini_api_key = key.trim().to_string();
    }
    if let Some(raw) = lookup("AQI_ADVISOR_MODELS") {
        config.generation.models = parse_model_list(&raw);
    }
    if let Some(raw) = lookup("AQI_FETCH_TIMEOUT_MS") {
        config.air_quality.timeout_ms = parse_positive_u64(&raw, "AQI_FETCH_TIMEOUT_MS")?;
    }
    if let Some(path) = lookup("AQI_ADVISOR_CACHE_PATH").and_then(non_empty) {
        config.cache.path = path;
    }
    if let Some(user_id) = lookup("AQI_ADVISOR_USER_ID") {
        config.profile.user_id = non_empty(user_id);
    }
    if let Some(path) = lookup("AQI_ADVISOR_CONDITIONS_PATH") {
        config.profile.conditions_path = non_empty(path);
    }
    Ok(())
}

fn config_file_path() -> PathBuf {
    std::env::var("AQI_ADVISOR_CONFIG")
        .ok()
        .and_then(non_empty)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn read_config_file(path: &Path) -> Result<AppConfig, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load advisor configuration from environment and optional config file.
pub fn load_config() -> Result<AppConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Defaults, replaced wholesale by the config file when present.
    let config_path = config_file_path();
    let mut config = if config_path.exists() {
        read_config_file(&config_path)?
    } else {
        AppConfig::default()
    };

    // 3. Environment variables win.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

/// The API key, or a config error naming the variable to set.
pub fn require_api_key(config: &AppConfig) -> Result<&str, Error> {
    let key = config.gemini_api_key.trim();
    if key.is_empty() {
        return Err(Error::Config(
            "GEMINI_API_KEY is required (set in .env or environment)".into(),
        ));
    }
    Ok(key)
}
