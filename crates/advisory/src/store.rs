//! Local key-value storage the result cache is built on.
//!
//! Each operation is atomic for a single key. No cross-key transactions.

use common::Error;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), Error>;
    fn remove_item(&self, key: &str) -> Result<(), Error>;
    fn keys(&self) -> Result<Vec<String>, Error>;
}

/// In-process store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.items.iter().map(|e| e.key().clone()).collect())
    }
}

/// Persistent store backed by one JSON object file, rewritten on every mutation.
/// The in-memory view only changes once the rewrite has landed on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`. An unreadable or
    /// undecodable file starts the store empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let items = if path.exists() {
            match load_items(&path) {
                Ok(items) => items,
                Err(e) => {
                    warn!(
                        "Store file {} unreadable, starting empty: {}",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), Error> {
        let data = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Storage(format!("replace {}: {e}", self.path.display())))
    }
}

fn load_items(path: &Path) -> Result<BTreeMap<String, String>, Error> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

impl KeyValueStore for JsonFileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut items = self.lock();
        let mut next = items.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *items = next;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), Error> {
        let mut items = self.lock();
        if !items.contains_key(key) {
            return Ok(());
        }
        let mut next = items.clone();
        next.remove(key);
        self.persist(&next)?;
        *items = next;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set_item("k", "v1").expect("set");
        store.set_item("k", "v2").expect("set");
        assert_eq!(store.get_item("k").expect("get").as_deref(), Some("v2"));
        store.remove_item("k").expect("remove");
        assert!(store.get_item("k").expect("get").is_none());
        store.remove_item("absent").expect("removing a missing key is a no-op");
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cache.json");

        {
            let store = JsonFileStore::open(&path).expect("open");
            store.set_item("aqi_cache_1.2.3.4", "{}").expect("set");
            store.set_item("theme", "dark").expect("set");
            store.remove_item("theme").expect("remove");
        }

        let reopened = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(
            reopened.keys().expect("keys"),
            vec!["aqi_cache_1.2.3.4".to_string()]
        );
    }

    #[test]
    fn test_failed_rewrite_leaves_memory_and_disk_in_agreement() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        let store = JsonFileStore::open(&path).expect("open");
        store.set_item("aqi_cache_A", "old").expect("set");

        // A directory squatting on the temp file path makes every rewrite fail.
        fs::create_dir(dir.path().join("cache.tmp")).expect("mkdir");

        assert!(store.set_item("aqi_cache_X", "v").is_err());
        assert!(store.get_item("aqi_cache_X").expect("get").is_none());

        assert!(store.remove_item("aqi_cache_A").is_err());
        assert_eq!(
            store.get_item("aqi_cache_A").expect("get").as_deref(),
            Some("old")
        );

        drop(store);
        let reopened = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(
            reopened.keys().expect("keys"),
            vec!["aqi_cache_A".to_string()]
        );
    }

    #[test]
    fn test_file_store_with_garbage_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json").expect("write");

        let store = JsonFileStore::open(&path).expect("open");
        assert!(store.keys().expect("keys").is_empty());
    }
}
