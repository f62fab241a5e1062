//! Persistent key-value storage for client state.
//!
//! The session token, user profile and conversion statistics are stored as
//! JSON strings under fixed keys, in the same shape a browser keeps them in
//! local storage. The state is best-effort: the server owns job state, so a
//! lost or corrupt file only costs the user a fresh login and zeroed stats.
//!
//! Two backends:
//! * [`FileStore`] keeps every key in one `state.json` file and rewrites it
//!   atomically (temp file + rename) on each change.
//! * [`MemoryStore`] lives only as long as the process.

use crate::error::D2xError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Name of the state file inside the state directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// String key-value storage shared by the session and stats stores.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), D2xError>;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), D2xError>;
}

/// Shared handle to a storage backend.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read and deserialise the JSON value under `key`.
///
/// Returns `Ok(None)` when the key is absent and
/// [`D2xError::CorruptState`] when the stored text is not valid JSON for `T`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, D2xError> {
    match store.get(key) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| D2xError::CorruptState {
                key: key.to_string(),
                detail: e.to_string(),
            }),
    }
}

/// Serialise `value` to JSON and store it under `key`.
pub fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), D2xError> {
    let raw = serde_json::to_string(value).map_err(|e| D2xError::CorruptState {
        key: key.to_string(),
        detail: e.to_string(),
    })?;
    store.set(key, &raw)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── In-memory backend ────────────────────────────────────────────────────

/// Process-lifetime storage. Used for tests and for `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), D2xError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), D2xError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// ── File backend ─────────────────────────────────────────────────────────

/// Storage backed by `<dir>/state.json`.
///
/// The whole map is cached in memory and written through on every change.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store in `dir`.
    ///
    /// A state file that cannot be parsed is ignored with a warning; it is
    /// overwritten on the next write.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, D2xError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| D2xError::Storage {
            path: dir.clone(),
            source: e,
        })?;
        let path = dir.join(STATE_FILE_NAME);

        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Ignoring unreadable state file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(D2xError::Storage { path, source: e }),
        };

        debug!("Opened state store {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            dir,
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn shared(dir: impl AsRef<Path>) -> Result<SharedStore, D2xError> {
        Ok(Arc::new(Self::open(dir)?))
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomic write: temp file in the same directory, then rename.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), D2xError> {
        let storage_err = |source: std::io::Error| D2xError::Storage {
            path: self.path.clone(),
            source,
        };
        let text = serde_json::to_string_pretty(entries).map_err(|e| D2xError::CorruptState {
            key: "*".to_string(),
            detail: e.to_string(),
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(storage_err)?;
        tmp.write_all(text.as_bytes()).map_err(storage_err)?;
        tmp.persist(&self.path).map_err(|e| storage_err(e.error))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), D2xError> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), D2xError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: u32,
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("k").is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert!(store.get("k").is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            write_json(&store, "counter", &Counter { n: 7 }).unwrap();
            store.set("accessToken", "tok").unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        let c: Option<Counter> = read_json(&store, "counter").unwrap();
        assert_eq!(c, Some(Counter { n: 7 }));
        assert_eq!(store.get("accessToken").as_deref(), Some("tok"));
        assert!(store.path().ends_with(STATE_FILE_NAME));
    }

    #[test]
    fn file_store_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("a", "1").unwrap();
        store.remove("a").unwrap();
        drop(store);
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get("a").is_none());
    }

    #[test]
    fn corrupt_state_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATE_FILE_NAME), "{not json").unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get("anything").is_none());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
    }

    #[test]
    fn read_json_reports_corrupt_value() {
        let store = MemoryStore::new();
        store.set("counter", "[1,2]").unwrap();
        let err = read_json::<Counter>(&store, "counter").unwrap_err();
        assert!(matches!(err, D2xError::CorruptState { ref key, .. } if key == "counter"));
    }
}
