//! Key-value persistence for session mappings.
//!
//! The session store keeps its mapping in memory and writes every change
//! through a [`KeyValueStore`]. Backends only need whole-map reads at startup
//! and single-key upserts.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// A durable string-to-string map.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns every entry.
    async fn get_all(&self) -> Result<BTreeMap<String, String>, StoreError>;

    /// Returns the value for `key`, if present.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Inserts or overwrites the value for `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Volatile in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a pretty-printed JSON object on disk.
///
/// A missing file reads as empty. Writes replace the file atomically via a
/// temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(StoreError::ReadFailed {
                    reason: format!("{}: {e}", self.path.display()),
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            reason: format!("{}: {e}", self.path.display()),
        })
    }

    async fn write_map(&self, key: &str, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let write_failed = |reason: String| StoreError::WriteFailed {
            key: key.to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_failed(format!("create {}: {e}", parent.display())))?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "sessions.json".to_string());
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let temp_path = self.path.with_file_name(format!(".{file_name}.{timestamp}.tmp"));

        let serialized = serde_json::to_string_pretty(map)
            .map_err(|e| write_failed(format!("encode: {e}")))?;
        tokio::fs::write(&temp_path, format!("{serialized}\n"))
            .await
            .map_err(|e| write_failed(format!("write {}: {e}", temp_path.display())))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| write_failed(format!("rename {}: {e}", temp_path.display())))?;

        debug!(path = %self.path.display(), entries = map.len(), "Persisted mappings");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        self.read_map().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_map().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(key, &map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryStore::new();
        store.set("U1-DM", "thread_1").await.expect("set");
        store.set("U1-DM", "thread_2").await.expect("set");

        assert_eq!(
            store.get("U1-DM").await.expect("get").as_deref(),
            Some("thread_2")
        );
        assert_eq!(store.get_all().await.expect("all").len(), 1);
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("absent.json"));

        assert!(store.get_all().await.expect("all").is_empty());
        assert!(store.get("U1-DM").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state").join("sessions.json");

        let store = JsonFileStore::new(&path);
        store.set("U1-DM", "thread_1").await.expect("set");
        store.set("U2-C1", "thread_2").await.expect("set");
        drop(store);

        let reopened = JsonFileStore::new(&path);
        let all = reopened.get_all().await.expect("all");
        assert_eq!(all.get("U1-DM").map(String::as_str), Some("thread_1"));
        assert_eq!(all.get("U2-C1").map(String::as_str), Some("thread_2"));

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\n  \"U1-DM\": \"thread_1\""));
    }

    #[tokio::test]
    async fn file_store_leaves_no_temp_files() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("sessions.json"));
        store.set("U1-DM", "thread_1").await.expect("set");

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["sessions.json".to_string()]);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "not json").expect("write");

        let err = JsonFileStore::new(&path).get_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
