use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashmap::DashMap;
use snafu::{ResultExt, Snafu};

use crate::model::CourseId;

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";

pub fn course_state_key(course_id: &CourseId) -> String {
    format!("course_{course_id}_state")
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("could not read storage file `{}`: {source}", path.display()))]
    Read { path: PathBuf, source: std::io::Error },

    #[snafu(display("could not write storage file `{}`: {source}", path.display()))]
    Write { path: PathBuf, source: std::io::Error },

    #[snafu(display("storage file `{}` is not a valid string map: {source}", path.display()))]
    Corrupted {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("could not serialize stored entry `{key}`: {source}"))]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

/// String key/value storage shared by every part of the client.
///
/// There is no locking across keys: concurrent writers to the same key resolve
/// as last writer wins.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A JSON file holding one flat string map, rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: DashMap<String, String>,
    flush: Mutex<()>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => DashMap::new(),
            Ok(content) => {
                let map: BTreeMap<String, String> =
                    serde_json::from_str(&content).context(CorruptedSnafu { path: &path })?;
                map.into_iter().collect()
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => DashMap::new(),
            Err(error) => return Err(error).context(ReadSnafu { path }),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened storage file");
        Ok(Self {
            path,
            entries,
            flush: Mutex::new(()),
        })
    }

    fn flush(&self) -> Result<()> {
        let _guard = match self.flush.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let content = serde_json::to_string_pretty(&snapshot).context(SerializeSnafu {
            key: self.path.display().to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(WriteSnafu { path: &self.path })?;
        }

        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, content).context(WriteSnafu { path: &staging })?;
        std::fs::rename(&staging, &self.path).context(WriteSnafu { path: &self.path })
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_key_format() {
        let course: CourseId = "12".parse().unwrap();
        assert_eq!(course_state_key(&course), "course_12_state");
    }

    #[test]
    fn memory_storage_last_writer_wins() {
        let storage = MemoryStorage::new();
        storage.set(ACCESS_TOKEN, "first".into()).unwrap();
        storage.set(ACCESS_TOKEN, "second".into()).unwrap();
        assert_eq!(storage.get(ACCESS_TOKEN).as_deref(), Some("second"));

        storage.remove(ACCESS_TOKEN).unwrap();
        assert_eq!(storage.get(ACCESS_TOKEN), None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set(ACCESS_TOKEN, "abc".into()).unwrap();
        storage.set(REFRESH_TOKEN, "def".into()).unwrap();
        storage.remove(REFRESH_TOKEN).unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(ACCESS_TOKEN).as_deref(), Some("abc"));
        assert_eq!(reopened.get(REFRESH_TOKEN), None);
    }

    #[test]
    fn missing_file_is_empty_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(storage.get(ACCESS_TOKEN), None);
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let result = FileStorage::open(&path);
        assert!(matches!(result, Err(StorageError::Corrupted { .. })));
    }
}
