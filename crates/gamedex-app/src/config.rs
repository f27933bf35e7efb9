//! Application configuration
//!
//! Loaded from a TOML file, then overridden by `GAMEDEX_*` environment
//! variables, then validated:
//!
//! ```toml
//! settings_dir = "/home/me/.config/gamedex"
//! log_filter = "gamedex_app=debug,info"
//! max_snapshot_depth = 16
//! ```

use crate::errors::AppError;
use crate::settings::RepositoryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Prefix for environment overrides, e.g. `GAMEDEX_LOG_FILTER`.
pub const ENV_PREFIX: &str = "GAMEDEX_";

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding one JSON file per settings namespace
    pub settings_dir: PathBuf,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Deepest allowed nesting of settings snapshots
    pub max_snapshot_depth: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_dir: dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gamedex"),
            log_filter: "info".to_string(),
            max_snapshot_depth: RepositoryConfig::default().max_snapshot_depth,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| AppError::config(format!("invalid TOML in {}: {e}", path.display())))
    }

    /// Apply `GAMEDEX_*` overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<(), AppError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs. Names without the
    /// `GAMEDEX_` prefix are ignored.
    pub fn merge_with_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), AppError> {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                self.set_from_string(&key.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Set one field by name.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        match key {
            "settings_dir" => self.settings_dir = PathBuf::from(value),
            "log_filter" => self.log_filter = value.to_string(),
            "max_snapshot_depth" => {
                self.max_snapshot_depth = value.parse().map_err(|e| {
                    AppError::config(format!("max_snapshot_depth '{value}': {e}"))
                })?;
            }
            other => tracing::debug!(key = other, "ignoring unknown configuration key"),
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.settings_dir.as_os_str().is_empty() {
            return Err(AppError::config("settings_dir must not be empty"));
        }
        if self.max_snapshot_depth == 0 {
            return Err(AppError::config("max_snapshot_depth must be at least 1"));
        }
        EnvFilter::try_new(&self.log_filter)
            .map_err(|e| AppError::config(format!("log_filter '{}': {e}", self.log_filter)))?;
        Ok(())
    }

    /// Settings repository limits derived from this configuration.
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            max_snapshot_depth: self.max_snapshot_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.settings_dir.ends_with("gamedex"));
    }

    #[test]
    fn load_from_file_fills_missing_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log_filter = \"debug\"").unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.max_snapshot_depth, AppConfig::default().max_snapshot_depth);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .merge_with_vars(vec![
                ("GAMEDEX_MAX_SNAPSHOT_DEPTH".to_string(), "4".to_string()),
                ("GAMEDEX_SETTINGS_DIR".to_string(), "/tmp/gd".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ])
            .unwrap();

        assert_eq!(config.max_snapshot_depth, 4);
        assert_eq!(config.settings_dir, PathBuf::from("/tmp/gd"));
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut config = AppConfig::default();
        assert!(config.set_from_string("max_snapshot_depth", "many").is_err());

        config.max_snapshot_depth = 0;
        assert!(matches!(config.validate(), Err(AppError::Config { .. })));
    }
}
