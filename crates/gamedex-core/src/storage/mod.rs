//! Persisted settings storage
//!
//! Settings are stored as one JSON document per namespace. Backends are
//! synchronous: settings documents are small and writes happen on explicit
//! user actions.

mod file;
mod memory;

pub use file::JsonFileStorage;
pub use memory::MemorySettingsStorage;

use crate::errors::StorageError;
use serde_json::Value;

/// Backend that holds one JSON document per settings namespace.
pub trait SettingsStorage: Send + Sync {
    /// Load the document for `namespace`, or `None` if nothing was stored yet.
    fn load(&self, namespace: &str) -> Result<Option<Value>, StorageError>;

    /// Replace the document for `namespace`.
    fn persist(&self, namespace: &str, value: &Value) -> Result<(), StorageError>;
}

/// Namespaces become file names, so keep them to a safe alphabet.
pub(crate) fn validate_namespace(namespace: &str) -> Result<(), StorageError> {
    let valid = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !namespace.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::configuration(format!(
            "invalid settings namespace '{namespace}'"
        )))
    }
}
