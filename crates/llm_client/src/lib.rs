//! Generative-model client and advisory generator.

pub mod client;
pub mod generator;
pub mod types;

pub use client::{GeminiClient, GenerativeTransport};
pub use generator::{extract_json_object, parse_advisory, AdvisoryGenerator};
pub use types::{DecodingParams, GenerationRequest, TransportError};
