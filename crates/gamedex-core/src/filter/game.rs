//! Game records as seen by filters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identifier of a game in the library.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game#{}", self.0)
    }
}

/// Platform a game runs on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    /// Windows PC
    #[default]
    Pc,
    /// macOS
    Mac,
    /// Linux
    Linux,
    /// Android
    Android,
    /// Excluded from all platform views
    Excluded,
}

/// Which provider entry a game was synced from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHeader {
    /// Provider identifier, e.g. `"igdb"`
    pub provider_id: String,
    /// The game's URL at that provider
    pub api_url: String,
    /// Name the provider reports for the game
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ProviderHeader {
    /// Create a header.
    pub fn new(provider_id: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            api_url: api_url.into(),
            name: None,
        }
    }

    /// Attach the name this provider reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The parts of a game that filter rules look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Library id
    pub id: GameId,
    /// Display name
    pub name: String,
    /// Platform
    pub platform: Platform,
    /// Folder on disk
    pub path: PathBuf,
    /// Genres reported by providers
    #[serde(default)]
    pub genres: Vec<String>,
    /// User tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Critic score, 0-100
    #[serde(default)]
    pub critic_score: Option<f64>,
    /// User score, 0-100
    #[serde(default)]
    pub user_score: Option<f64>,
    /// Providers this game was synced from
    #[serde(default)]
    pub provider_headers: Vec<ProviderHeader>,
    /// Providers the user excluded for this game
    #[serde(default)]
    pub excluded_providers: Vec<String>,
}

impl Game {
    /// Create a game with no metadata.
    pub fn new(id: u64, name: impl Into<String>, platform: Platform, path: impl Into<PathBuf>) -> Self {
        Self {
            id: GameId(id),
            name: name.into(),
            platform,
            path: path.into(),
            genres: Vec::new(),
            tags: Vec::new(),
            critic_score: None,
            user_score: None,
            provider_headers: Vec::new(),
            excluded_providers: Vec::new(),
        }
    }

    /// Folder on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mean of the available scores.
    pub fn avg_score(&self) -> Option<f64> {
        match (self.critic_score, self.user_score) {
            (Some(c), Some(u)) => Some((c + u) / 2.0),
            (Some(s), None) | (None, Some(s)) => Some(s),
            (None, None) => None,
        }
    }

    /// Lowest of the available scores.
    pub fn min_score(&self) -> Option<f64> {
        match (self.critic_score, self.user_score) {
            (Some(c), Some(u)) => Some(c.min(u)),
            (s, None) | (None, s) => s,
        }
    }

    /// Highest of the available scores.
    pub fn max_score(&self) -> Option<f64> {
        match (self.critic_score, self.user_score) {
            (Some(c), Some(u)) => Some(c.max(u)),
            (s, None) | (None, s) => s,
        }
    }

    /// Last component of the game's folder, if it is valid UTF-8.
    pub fn folder_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Whether the user excluded `provider_id` for this game.
    pub fn is_provider_excluded(&self, provider_id: &str) -> bool {
        self.excluded_providers.iter().any(|p| p == provider_id)
    }

    /// Whether this game was synced from `provider_id`.
    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.provider_headers
            .iter()
            .any(|h| h.provider_id == provider_id)
    }
}
