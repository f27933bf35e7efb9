//! Process-wide application context
//!
//! Built once at startup and passed to whoever needs the bus or a settings
//! repository. Cloning shares everything.

use crate::config::AppConfig;
use crate::errors::Result;
use crate::events::CoreEventBus;
use crate::settings::{GameSettingsRepository, GeneralSettingsRepository, SnapshotState};
use gamedex_core::{JsonFileStorage, SettingsStorage};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared services of a running application.
#[derive(Clone)]
pub struct AppContext {
    config: Arc<AppConfig>,
    storage: Arc<dyn SettingsStorage>,
    bus: CoreEventBus,
    general: GeneralSettingsRepository,
    game: GameSettingsRepository,
}

impl AppContext {
    /// Validate `config` and open the settings repositories from JSON files
    /// under its settings directory.
    pub fn init(config: AppConfig) -> Result<Self> {
        let storage = Arc::new(JsonFileStorage::new(config.settings_dir.clone()));
        Self::with_storage(config, storage)
    }

    /// Like [`init`](Self::init) with an explicit storage backend.
    pub fn with_storage(config: AppConfig, storage: Arc<dyn SettingsStorage>) -> Result<Self> {
        config.validate()?;
        let repo_config = config.repository_config();
        let general = GeneralSettingsRepository::open(storage.clone(), repo_config)?;
        let game = GameSettingsRepository::open(storage.clone(), repo_config)?;
        info!(settings_dir = %config.settings_dir.display(), "application context ready");
        Ok(Self {
            config: Arc::new(config),
            storage,
            bus: CoreEventBus::new(),
            general,
            game,
        })
    }

    /// Configuration the context was built from.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Settings backend shared by all repositories.
    pub fn storage(&self) -> &Arc<dyn SettingsStorage> {
        &self.storage
    }

    /// Application event bus.
    pub fn bus(&self) -> &CoreEventBus {
        &self.bus
    }

    /// `general` settings.
    pub fn general(&self) -> &GeneralSettingsRepository {
        &self.general
    }

    /// `game` settings.
    pub fn game(&self) -> &GameSettingsRepository {
        &self.game
    }

    /// Flush every repository before exit.
    ///
    /// A repository with an open snapshot is skipped with a warning; its
    /// pending edits belong to a dialog that never closed.
    pub fn shutdown(&self) -> Result<()> {
        flush_if_clean(self.general.repo().namespace(), self.general.repo().snapshot_state(), || {
            self.general.repo().flush()
        })?;
        flush_if_clean(self.game.repo().namespace(), self.game.repo().snapshot_state(), || {
            self.game.repo().flush()
        })?;
        info!("application context shut down");
        Ok(())
    }
}

fn flush_if_clean(
    namespace: &str,
    state: SnapshotState,
    flush: impl FnOnce() -> std::result::Result<(), crate::errors::SettingsError>,
) -> Result<()> {
    match state {
        SnapshotState::Clean => Ok(flush()?),
        SnapshotState::Snapshotted(depth) => {
            warn!(namespace, depth, "snapshot still open at shutdown, not flushing");
            Ok(())
        }
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
