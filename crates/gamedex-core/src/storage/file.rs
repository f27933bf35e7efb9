//! JSON-file settings storage
//!
//! Each namespace lives in `<base_dir>/<namespace>.json`. Writes go to a
//! temporary file first and are then renamed over the target, so a crash
//! mid-write never leaves a truncated document.

use super::{validate_namespace, SettingsStorage};
use crate::errors::StorageError;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings storage backed by one JSON file per namespace.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    base_dir: PathBuf,
}

impl JsonFileStorage {
    /// Store settings under `base_dir`. The directory is created on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Directory holding the settings files.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// File that holds `namespace`.
    pub fn path_for(&self, namespace: &str) -> PathBuf {
        self.base_dir.join(format!("{namespace}.json"))
    }

    fn write_atomic(&self, namespace: &str, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let io_err = |context: &str, e: std::io::Error| {
            StorageError::io(namespace, format!("{context}: {e}"))
        };

        fs::create_dir_all(&self.base_dir)
            .map_err(|e| io_err("failed to create settings directory", e))?;

        let temp_path = path.with_extension("json.tmp");
        let mut file =
            fs::File::create(&temp_path).map_err(|e| io_err("failed to create temp file", e))?;
        file.write_all(data)
            .map_err(|e| io_err("failed to write data", e))?;
        file.sync_all().map_err(|e| io_err("failed to sync", e))?;

        fs::rename(&temp_path, path).map_err(|e| io_err("failed to rename temp file", e))
    }
}

impl SettingsStorage for JsonFileStorage {
    fn load(&self, namespace: &str) -> Result<Option<Value>, StorageError> {
        validate_namespace(namespace)?;
        let path = self.path_for(namespace);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(namespace, e.to_string())),
        };
        let value = serde_json::from_str(&text)
            .map_err(|e| StorageError::corrupt(namespace, e.to_string()))?;
        debug!(namespace, path = %path.display(), "loaded settings");
        Ok(Some(value))
    }

    fn persist(&self, namespace: &str, value: &Value) -> Result<(), StorageError> {
        validate_namespace(namespace)?;
        let path = self.path_for(namespace);
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| StorageError::corrupt(namespace, e.to_string()))?;
        self.write_atomic(namespace, &path, &data)?;
        debug!(namespace, path = %path.display(), bytes = data.len(), "persisted settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path());
        assert_eq!(storage.load("general").unwrap(), None);
    }

    #[test]
    fn persist_creates_directory_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested"));
        let doc = json!({"searchResultLimit": 10, "logTail": false});

        storage.persist("general", &doc).unwrap();

        assert_eq!(storage.load("general").unwrap(), Some(doc));
        assert!(!storage.path_for("general").with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path());
        fs::write(storage.path_for("general"), "{ not json").unwrap();

        let err = storage.load("general").unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
