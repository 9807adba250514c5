//! IP-keyed cache of pollutant readings.
//!
//! One slot per partition key, valid for a fixed hour. Stale, mismatched
//! or undecodable slots are deleted when `get` finds them; there is no
//! background sweep.

use crate::store::KeyValueStore;
use chrono::{DateTime, Duration, Utc};
use common::{Coordinates, Error, PollutantReading};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Validity window of a cache entry, in seconds.
pub const CACHE_TTL_SECS: i64 = 60 * 60;

/// Prefix shared by every slot this cache owns in the store.
pub const CACHE_KEY_PREFIX: &str = "aqi_cache_";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cache slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub partition_key: String,
    pub reading: PollutantReading,
    pub coordinates: Coordinates,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at > Duration::seconds(CACHE_TTL_SECS)
    }
}

pub fn slot_key(partition_key: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{partition_key}")
}

pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Valid entry for `partition_key`, if any. Never fails.
    pub fn get(&self, partition_key: &str) -> Option<CacheEntry> {
        let key = slot_key(partition_key);
        let raw = match self.store.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                let err = Error::CacheCorrupt(e.to_string());
                warn!("Dropping cache slot {}: {}", key, err);
                self.evict(&key);
                return None;
            }
        };

        if entry.partition_key != partition_key {
            debug!(
                "Cache slot {} belongs to another partition, evicting",
                key
            );
            self.evict(&key);
            return None;
        }
        if entry.is_stale(self.clock.now()) {
            debug!(
                "Cache slot {} expired (stored_at={}), evicting",
                key, entry.stored_at
            );
            self.evict(&key);
            return None;
        }

        Some(entry)
    }

    /// Overwrite the slot for `partition_key` with a fresh entry.
    pub fn put(
        &self,
        partition_key: &str,
        reading: &PollutantReading,
        coordinates: Coordinates,
    ) -> Result<CacheEntry, Error> {
        let entry = CacheEntry {
            partition_key: partition_key.to_string(),
            reading: reading.clone(),
            coordinates,
            stored_at: self.clock.now(),
        };
        let raw = serde_json::to_string(&entry)?;
        self.store.set_item(&slot_key(partition_key), &raw)?;
        Ok(entry)
    }

    pub fn invalidate(&self, partition_key: &str) -> Result<(), Error> {
        self.store.remove_item(&slot_key(partition_key))
    }

    /// Remove every slot owned by this cache. Returns how many were removed.
    pub fn invalidate_all(&self) -> Result<usize, Error> {
        let owned: Vec<String> = self
            .store
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(CACHE_KEY_PREFIX))
            .collect();
        for key in &owned {
            self.store.remove_item(key)?;
        }
        Ok(owned.len())
    }

    fn evict(&self, key: &str) {
        if let Err(e) = self.store.remove_item(key) {
            warn!("Failed to evict cache slot {}: {}", key, e);
        }
    }
}
