//! Air-quality advisory pipeline.
//!
//! Resolves the caller's location from their public IP, reuses a cached
//! pollutant reading for that IP while it is under an hour old, and asks a
//! generative model for a structured go-outside advisory.

pub mod cache;
pub mod conditions;
pub mod orchestrator;
pub mod prompt;
pub mod store;

pub use cache::{CacheEntry, Clock, ResultCache, SystemClock, CACHE_KEY_PREFIX, CACHE_TTL_SECS};
pub use conditions::{ConditionStore, JsonConditionStore, StaticConditions};
pub use orchestrator::{AdvisoryReport, RefreshOrchestrator, RefreshSnapshot, Stage};
pub use prompt::{build_prompt, conditions_summary, MAX_PROMPT_CONDITIONS};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
