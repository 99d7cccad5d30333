//! Durable last-processed update id.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TelegramResult;

/// Storage for the highest update id already handled.
pub trait OffsetStore: Send + Sync {
    /// The stored id, or `0` if nothing was stored yet.
    fn last_update_id(&self) -> TelegramResult<i64>;

    fn set_last_update_id(&self, id: i64) -> TelegramResult<()>;
}

/// On-disk shape of the offset file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetState {
    pub last_update_id: i64,
    pub updated: DateTime<Utc>,
}

/// JSON file store. Writes go to a sibling temp file that is renamed over
/// the target, so a crash never leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct FileOffsetStore {
    path: PathBuf,
}

impl FileOffsetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full stored state, `None` if the file does not exist.
    pub fn load(&self) -> TelegramResult<Option<OffsetState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl OffsetStore for FileOffsetStore {
    fn last_update_id(&self) -> TelegramResult<i64> {
        Ok(self.load()?.map_or(0, |s| s.last_update_id))
    }

    fn set_last_update_id(&self, id: i64) -> TelegramResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let state = OffsetState {
            last_update_id: id,
            updated: Utc::now(),
        };
        let tmp = self.temp_path();
        std::fs::write(&tmp, serde_json::to_string_pretty(&state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Volatile store, for tests and for running without persistence.
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    id: AtomicI64,
}

impl MemoryOffsetStore {
    pub fn new(initial: i64) -> Self {
        Self {
            id: AtomicI64::new(initial),
        }
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn last_update_id(&self) -> TelegramResult<i64> {
        Ok(self.id.load(Ordering::SeqCst))
    }

    fn set_last_update_id(&self, id: i64) -> TelegramResult<()> {
        self.id.store(id, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelegramError;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_zero() {
        let dir = TempDir::new().unwrap();
        let store = FileOffsetStore::new(dir.path().join("state.json"));
        assert_eq!(store.last_update_id().unwrap(), 0);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/telegram-state.json");

        FileOffsetStore::new(&path).set_last_update_id(105).unwrap();

        let reopened = FileOffsetStore::new(&path);
        assert_eq!(reopened.last_update_id().unwrap(), 105);
        assert!(!dir.path().join("nested/telegram-state.json.tmp").exists());
    }

    #[test]
    fn file_holds_id_and_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        FileOffsetStore::new(&path).set_last_update_id(42).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["last_update_id"], 42);
        assert!(raw["updated"].is_string());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileOffsetStore::new(&path).last_update_id().unwrap_err();
        assert!(matches!(err, TelegramError::StateParse(_)));
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryOffsetStore::new(3);
        assert_eq!(store.last_update_id().unwrap(), 3);
        store.set_last_update_id(9).unwrap();
        assert_eq!(store.last_update_id().unwrap(), 9);
    }
}
