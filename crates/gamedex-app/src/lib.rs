//! # Gamedex App
//!
//! Application layer over `gamedex-core`:
//!
//! - [`settings`]: transactional, persisted settings repositories with
//!   per-field distinct channels.
//! - [`session`]: per-view presentation sessions that own handler tasks and
//!   bus subscriptions.
//! - [`presenters`]: presenters for the settings dialogs.
//! - [`context`]: the process-wide [`AppContext`] built from [`AppConfig`].

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod logging;
pub mod presenters;
pub mod session;
pub mod settings;

pub use config::AppConfig;
pub use context::AppContext;
pub use errors::{AppError, Result, SettingsError};
pub use events::{CoreEvent, CoreEventBus, CoreEventKind};
pub use logging::init_tracing;
pub use presenters::{IsValid, SettingsPresenter, SettingsView};
pub use session::{PresentationSession, Presenter, SessionState, ViewProperty};
pub use settings::{
    FieldChannel, GameSettingsRepository, GeneralSettingsRepository, RepositoryConfig,
    SettingsData, SettingsRepository, SnapshotState,
};
