//! # Settings
//!
//! [`SettingsRepository`] is the generic transactional store; the concrete
//! repositories give each settings namespace its typed fields.

mod game;
mod general;
mod repository;

pub use game::{GamePlatformSettings, GameSettings, GameSettingsRepository, Sort, SortBy, SortOrder};
pub use general::{GeneralSettings, GeneralSettingsRepository, LogLevel};
pub use repository::{
    FieldChannel, RepositoryConfig, SettingsData, SettingsRepository, SnapshotState,
};
