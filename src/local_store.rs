use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::warn;

/// Key holding the epoch-ms timestamp of the last session-validating check.
pub const LAST_ACTIVITY_KEY: &str = "lastActivity";

trait ClientStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn clear(&self);
    fn save(&self) -> anyhow::Result<()>;
}

#[derive(Default)]
struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl ClientStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.data.lock() {
            guard.clear();
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// JSON-file backed store. Writes go through a temp file in the same
/// directory so a crash mid-save never truncates existing state.
struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStore {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parse client state at {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(anyhow::Error::from(err))
                    .with_context(|| format!("read client state at {}", path.display()))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }
}

impl ClientStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.data.lock() {
            guard.clear();
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        let snapshot = self
            .data
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        let parent = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)
            .with_context(|| format!("create state dir {}", parent.display()))?;
        let bytes = serde_json::to_vec_pretty(&snapshot).context("encode client state")?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("stage client state in {}", parent.display()))?;
        tmp.write_all(&bytes).context("write client state")?;
        tmp.persist(&self.path)
            .with_context(|| format!("persist client state to {}", self.path.display()))?;
        Ok(())
    }
}

/// Handle over the persisted client-side key/value state.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn ClientStore + Send + Sync>,
}

impl StoreHandle {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(MemoryStore::default()),
        }
    }

    pub fn file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            inner: Arc::new(FileStore::open(path)?),
        })
    }

    /// Conventional on-disk location under the platform data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("hearthstore").join("client-state.json"))
    }

    pub fn read_last_activity(&self) -> Option<i64> {
        self.inner
            .get(LAST_ACTIVITY_KEY)
            .and_then(|raw| raw.parse().ok())
    }

    pub fn write_last_activity(&self, ms: i64) {
        self.inner.set(LAST_ACTIVITY_KEY, &ms.to_string());
        self.persist_or_warn("last_activity_save_failed");
    }

    /// Drop all persisted client-side state; sign-out calls this.
    pub fn clear(&self) {
        self.inner.clear();
        self.persist_or_warn("client_state_clear_failed");
    }

    fn persist_or_warn(&self, event: &'static str) {
        if let Err(err) = self.inner.save() {
            warn!(
                target: "hearthstore",
                event,
                error = %err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_round_trips_last_activity() {
        let store = StoreHandle::in_memory();
        assert_eq!(store.read_last_activity(), None);
        store.write_last_activity(1234);
        assert_eq!(store.read_last_activity(), Some(1234));
        store.clear();
        assert_eq!(store.read_last_activity(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");

        let store = StoreHandle::file(&path).expect("open");
        store.write_last_activity(9876);
        drop(store);

        let reopened = StoreHandle::file(&path).expect("reopen");
        assert_eq!(reopened.read_last_activity(), Some(9876));
    }

    #[test]
    fn file_store_clear_removes_keys_on_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");

        let store = StoreHandle::file(&path).expect("open");
        store.write_last_activity(1);
        store.clear();
        drop(store);

        let reopened = StoreHandle::file(&path).expect("reopen");
        assert_eq!(reopened.read_last_activity(), None);
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempdir().expect("tempdir");
        let store = StoreHandle::file(&dir.path().join("absent.json")).expect("open");
        assert_eq!(store.read_last_activity(), None);
    }
}
