//! Error types for the application layer

use gamedex_core::StorageError;

/// Failure of a settings repository operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    /// The backend rejected a write. The in-memory value was still applied.
    #[error("Failed to persist settings '{namespace}': {source}")]
    Persist {
        /// Repository namespace
        namespace: String,
        /// Backend failure
        #[source]
        source: StorageError,
    },

    /// The stored document could not be read.
    #[error("Failed to load settings '{namespace}': {source}")]
    Load {
        /// Repository namespace
        namespace: String,
        /// Backend failure
        #[source]
        source: StorageError,
    },

    /// The value could not be converted to or from its stored form.
    #[error("Settings '{namespace}' could not be serialized: {message}")]
    Serialization {
        /// Repository namespace
        namespace: String,
        /// Codec failure description
        message: String,
    },
}

impl SettingsError {
    /// Namespace of the repository that failed.
    pub fn namespace(&self) -> &str {
        match self {
            Self::Persist { namespace, .. }
            | Self::Load { namespace, .. }
            | Self::Serialization { namespace, .. } => namespace,
        }
    }
}

/// Unified error type for application setup and teardown.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// Settings repository failure
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl AppError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result alias for application operations
pub type Result<T> = std::result::Result<T, AppError>;
