//! Game library view settings.
//!
//! Each platform keeps its own filter and search text. The
//! `current_platform_settings` channel follows whichever platform is
//! selected, so switching platform re-emits it even though the per-platform
//! map did not change.

use super::repository::{FieldChannel, RepositoryConfig, SettingsRepository};
use crate::errors::SettingsError;
use gamedex_core::filter::{Filter, Platform};
use gamedex_core::SettingsStorage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Filter and search text remembered for one platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamePlatformSettings {
    /// Active filter
    pub filter: Filter,
    /// Search box text
    pub search: String,
}

/// Column the library is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum SortBy {
    Name,
    #[default]
    CriticScore,
    UserScore,
    AvgScore,
    Size,
    ReleaseDate,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Sort column and direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    /// Column
    pub sort_by: SortBy,
    /// Direction
    pub order: SortOrder,
}

/// Settings stored under the `game` namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    /// Selected platform
    pub platform: Platform,
    /// Remembered filter and search per platform
    pub platform_settings: BTreeMap<Platform, GamePlatformSettings>,
    /// Library sort
    pub sort: Sort,
}

impl GameSettings {
    /// Settings of the selected platform, or the defaults if none were saved.
    pub fn current_platform_settings(&self) -> GamePlatformSettings {
        self.platform_settings
            .get(&self.platform)
            .cloned()
            .unwrap_or_default()
    }
}

/// Repository for [`GameSettings`].
#[derive(Debug, Clone)]
pub struct GameSettingsRepository {
    repo: SettingsRepository<GameSettings>,
    platform: FieldChannel<Platform>,
    platform_settings: FieldChannel<BTreeMap<Platform, GamePlatformSettings>>,
    current_platform_settings: FieldChannel<GamePlatformSettings>,
    search: FieldChannel<String>,
    sort: FieldChannel<Sort>,
}

impl GameSettingsRepository {
    /// Storage namespace.
    pub const NAMESPACE: &'static str = "game";

    /// Open the repository.
    pub fn open(
        storage: Arc<dyn SettingsStorage>,
        config: RepositoryConfig,
    ) -> Result<Self, SettingsError> {
        let repo = SettingsRepository::open(Self::NAMESPACE, storage, config, GameSettings::default)?;
        Ok(Self {
            platform: repo.field("platform", |d: &GameSettings| d.platform),
            platform_settings: repo.field("platform_settings", |d: &GameSettings| {
                d.platform_settings.clone()
            }),
            current_platform_settings: repo.field(
                "current_platform_settings",
                GameSettings::current_platform_settings,
            ),
            search: repo.field("search", |d: &GameSettings| {
                d.current_platform_settings().search
            }),
            sort: repo.field("sort", |d: &GameSettings| d.sort),
            repo,
        })
    }

    /// The underlying repository.
    pub fn repo(&self) -> &SettingsRepository<GameSettings> {
        &self.repo
    }

    /// Selected platform.
    pub fn platform(&self) -> &FieldChannel<Platform> {
        &self.platform
    }

    /// Per-platform settings map.
    pub fn platform_settings(&self) -> &FieldChannel<BTreeMap<Platform, GamePlatformSettings>> {
        &self.platform_settings
    }

    /// Settings of the selected platform.
    pub fn current_platform_settings(&self) -> &FieldChannel<GamePlatformSettings> {
        &self.current_platform_settings
    }

    /// Search text of the selected platform.
    pub fn search(&self) -> &FieldChannel<String> {
        &self.search
    }

    /// Library sort.
    pub fn sort(&self) -> &FieldChannel<Sort> {
        &self.sort
    }

    /// Select a platform.
    pub fn set_platform(&self, platform: Platform) -> Result<(), SettingsError> {
        self.repo.modify(|d| GameSettings { platform, ..d })
    }

    /// Change the library sort.
    pub fn set_sort(&self, sort: Sort) -> Result<(), SettingsError> {
        self.repo.modify(|d| GameSettings { sort, ..d })
    }

    /// Update the selected platform's settings.
    pub fn modify_current_platform_settings(
        &self,
        f: impl FnOnce(GamePlatformSettings) -> GamePlatformSettings,
    ) -> Result<(), SettingsError> {
        self.repo.modify(|mut d| {
            let updated = f(d.current_platform_settings());
            d.platform_settings.insert(d.platform, updated);
            d
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamedex_core::MemorySettingsStorage;

    fn open() -> GameSettingsRepository {
        GameSettingsRepository::open(
            Arc::new(MemorySettingsStorage::new()),
            RepositoryConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn search_edit_emits_only_search_channels() {
        let repo = open();
        let mut search = repo.search().subscribe();
        let mut platform = repo.platform().subscribe();
        assert_eq!(search.try_recv(), Some(String::new()));
        assert_eq!(platform.try_recv(), Some(Platform::Pc));

        repo.modify_current_platform_settings(|s| GamePlatformSettings {
            search: "abc".into(),
            ..s
        })
        .unwrap();

        assert_eq!(search.try_recv(), Some("abc".to_string()));
        assert_eq!(search.try_recv(), None);
        assert_eq!(platform.try_recv(), None);
    }

    #[test]
    fn switching_platform_switches_current_settings() {
        let repo = open();
        repo.modify_current_platform_settings(|s| GamePlatformSettings {
            filter: Filter::Tag { tag: "rpg".into() },
            ..s
        })
        .unwrap();
        let mut current = repo.current_platform_settings().subscribe();
        current.try_recv();

        repo.set_platform(Platform::Linux).unwrap();

        assert_eq!(current.try_recv(), Some(GamePlatformSettings::default()));
        repo.set_platform(Platform::Pc).unwrap();
        assert_eq!(
            current.try_recv().map(|s| s.filter),
            Some(Filter::Tag { tag: "rpg".into() })
        );
    }

    #[test]
    fn platform_map_round_trips_through_json() {
        let mut settings = GameSettings::default();
        settings.platform_settings.insert(
            Platform::Mac,
            GamePlatformSettings {
                filter: Filter::NullCriticScore,
                search: "q".into(),
            },
        );
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["platformSettings"]["mac"]["search"], "q");

        let back: GameSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }
}
