//! General application settings.

use super::repository::{FieldChannel, RepositoryConfig, SettingsRepository};
use crate::errors::SettingsError;
use gamedex_core::SettingsStorage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Minimum level shown in the in-app log view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Settings stored under the `general` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSettings {
    /// Directory last browsed to
    pub prev_directory: PathBuf,
    /// Directory the database was last exported to
    pub export_db_directory: PathBuf,
    /// Log view filter
    pub log_filter_level: LogLevel,
    /// Whether the log view follows new entries
    pub log_tail: bool,
    /// Whether links open in the built-in browser
    pub use_internal_browser: bool,
    /// Maximum results shown per provider search
    pub search_result_limit: u32,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            prev_directory: PathBuf::from("."),
            export_db_directory: PathBuf::from("."),
            log_filter_level: LogLevel::Info,
            log_tail: true,
            use_internal_browser: true,
            search_result_limit: 10,
        }
    }
}

/// Repository for [`GeneralSettings`] with one channel per field.
#[derive(Debug, Clone)]
pub struct GeneralSettingsRepository {
    repo: SettingsRepository<GeneralSettings>,
    prev_directory: FieldChannel<PathBuf>,
    export_db_directory: FieldChannel<PathBuf>,
    log_filter_level: FieldChannel<LogLevel>,
    log_tail: FieldChannel<bool>,
    use_internal_browser: FieldChannel<bool>,
    search_result_limit: FieldChannel<u32>,
}

impl GeneralSettingsRepository {
    /// Storage namespace.
    pub const NAMESPACE: &'static str = "general";

    /// Open the repository.
    pub fn open(
        storage: Arc<dyn SettingsStorage>,
        config: RepositoryConfig,
    ) -> Result<Self, SettingsError> {
        let repo =
            SettingsRepository::open(Self::NAMESPACE, storage, config, GeneralSettings::default)?;
        Ok(Self {
            prev_directory: repo.field("prev_directory", |d: &GeneralSettings| {
                d.prev_directory.clone()
            }),
            export_db_directory: repo.field("export_db_directory", |d: &GeneralSettings| {
                d.export_db_directory.clone()
            }),
            log_filter_level: repo.field("log_filter_level", |d: &GeneralSettings| {
                d.log_filter_level
            }),
            log_tail: repo.field("log_tail", |d: &GeneralSettings| d.log_tail),
            use_internal_browser: repo.field("use_internal_browser", |d: &GeneralSettings| {
                d.use_internal_browser
            }),
            search_result_limit: repo.field("search_result_limit", |d: &GeneralSettings| {
                d.search_result_limit
            }),
            repo,
        })
    }

    /// The underlying repository.
    pub fn repo(&self) -> &SettingsRepository<GeneralSettings> {
        &self.repo
    }

    /// Directory last browsed to.
    pub fn prev_directory(&self) -> &FieldChannel<PathBuf> {
        &self.prev_directory
    }

    /// Directory the database was last exported to.
    pub fn export_db_directory(&self) -> &FieldChannel<PathBuf> {
        &self.export_db_directory
    }

    /// Log view filter.
    pub fn log_filter_level(&self) -> &FieldChannel<LogLevel> {
        &self.log_filter_level
    }

    /// Whether the log view follows new entries.
    pub fn log_tail(&self) -> &FieldChannel<bool> {
        &self.log_tail
    }

    /// Whether links open in the built-in browser.
    pub fn use_internal_browser(&self) -> &FieldChannel<bool> {
        &self.use_internal_browser
    }

    /// Maximum results shown per provider search.
    pub fn search_result_limit(&self) -> &FieldChannel<u32> {
        &self.search_result_limit
    }

    /// Remember the last browsed directory.
    pub fn set_prev_directory(&self, dir: PathBuf) -> Result<(), SettingsError> {
        self.repo.modify(|d| GeneralSettings {
            prev_directory: dir,
            ..d
        })
    }

    /// Remember the last export directory.
    pub fn set_export_db_directory(&self, dir: PathBuf) -> Result<(), SettingsError> {
        self.repo.modify(|d| GeneralSettings {
            export_db_directory: dir,
            ..d
        })
    }

    /// Change the log view filter.
    pub fn set_log_filter_level(&self, level: LogLevel) -> Result<(), SettingsError> {
        self.repo.modify(|d| GeneralSettings {
            log_filter_level: level,
            ..d
        })
    }

    /// Toggle log tailing.
    pub fn set_log_tail(&self, tail: bool) -> Result<(), SettingsError> {
        self.repo.modify(|d| GeneralSettings {
            log_tail: tail,
            ..d
        })
    }

    /// Toggle the built-in browser.
    pub fn set_use_internal_browser(&self, internal: bool) -> Result<(), SettingsError> {
        self.repo.modify(|d| GeneralSettings {
            use_internal_browser: internal,
            ..d
        })
    }

    /// Change the provider search result limit.
    pub fn set_search_result_limit(&self, limit: u32) -> Result<(), SettingsError> {
        self.repo.modify(|d| GeneralSettings {
            search_result_limit: limit,
            ..d
        })
    }
}
