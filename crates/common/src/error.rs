//! Unified error type for the air-quality advisor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("No air quality data available: {0}")]
    NoDataAvailable(String),

    /// A stored cache slot could not be decoded. Absorbed by the cache itself.
    #[error("Cache entry corrupt: {0}")]
    CacheCorrupt(String),

    #[error("Advisory generation failed: {0}")]
    GenerationFailed(String),

    #[error("Malformed advisory: {0}")]
    MalformedAdvisory(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
