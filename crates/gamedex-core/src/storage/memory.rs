//! In-memory settings storage for tests and ephemeral sessions

use super::{validate_namespace, SettingsStorage};
use crate::errors::StorageError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// In-memory settings storage.
///
/// Counts persists per namespace and can be told to fail, which makes it the
/// usual backend for repository tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStorage {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<String, Value>,
    persists: HashMap<String, usize>,
    failing: bool,
}

impl MemorySettingsStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage with `value` already stored under `namespace`.
    pub fn with_document(namespace: impl Into<String>, value: Value) -> Self {
        let storage = Self::new();
        storage.state.lock().documents.insert(namespace.into(), value);
        storage
    }

    /// The stored document for `namespace`, if any.
    pub fn document(&self, namespace: &str) -> Option<Value> {
        self.state.lock().documents.get(namespace).cloned()
    }

    /// How many successful persists `namespace` has seen.
    pub fn persist_count(&self, namespace: &str) -> usize {
        self.state
            .lock()
            .persists
            .get(namespace)
            .copied()
            .unwrap_or(0)
    }

    /// Make every later persist fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }
}

impl SettingsStorage for MemorySettingsStorage {
    fn load(&self, namespace: &str) -> Result<Option<Value>, StorageError> {
        validate_namespace(namespace)?;
        Ok(self.document(namespace))
    }

    fn persist(&self, namespace: &str, value: &Value) -> Result<(), StorageError> {
        validate_namespace(namespace)?;
        let mut state = self.state.lock();
        if state.failing {
            return Err(StorageError::io(namespace, "memory storage set to fail"));
        }
        state.documents.insert(namespace.to_string(), value.clone());
        *state.persists.entry(namespace.to_string()).or_default() += 1;
        Ok(())
    }
}
