use std::collections::HashMap;

use anyhow::Result;

/// Last watched season/episode of a title. Both ids absent means "not started".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchPosition {
    pub title_id: String,
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Default,
    Cinema,
}

impl DisplayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Cinema => "cinema",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "default" => Some(Self::Default),
            "cinema" => Some(Self::Cinema),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Default => Self::Cinema,
            Self::Cinema => Self::Default,
        }
    }
}

/// Viewer preferences that outlive a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub display_mode: DisplayMode,
    pub autoplay: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Default,
            autoplay: true,
        }
    }
}

/// Durable per-title progress and position, as seen by the playback core.
///
/// Implementations never fail towards the caller: errors are logged and the
/// in-memory selection stays authoritative.
pub trait PersistencePort: Send + Sync {
    fn update_progress(&self, title_id: &str, percent: u8);
    fn update_position(&self, title_id: &str, season_id: &str, episode_id: &str);
    fn read_progress(&self) -> HashMap<String, u8>;
    fn read_positions(&self) -> HashMap<String, WatchPosition>;

    /// Synchronous last-chance write used when the session is torn down.
    fn beacon_progress(&self, title_id: &str, percent: u8) {
        self.update_progress(title_id, percent);
    }

    fn beacon_position(&self, title_id: &str, season_id: &str, episode_id: &str) {
        self.update_position(title_id, season_id, episode_id);
    }
}

/// Fallible storage backend behind a [`PersistencePort`].
///
/// Every write carries a sequence number. Within one process the
/// [`ProgressWriter`](super::ProgressWriter) never hands a backend an older
/// write after a newer one for the same title and kind. A backend that can
/// also compare sequences itself (the SQLite store does) keeps that order
/// across processes too.
pub trait ProgressStore: Send + Sync {
    fn write_progress(&self, title_id: &str, percent: u8, seq: i64) -> Result<()>;
    fn write_position(&self, position: &WatchPosition, seq: i64) -> Result<()>;
    fn load_progress(&self) -> Result<HashMap<String, u8>>;
    fn load_positions(&self) -> Result<HashMap<String, WatchPosition>>;
}

pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Preferences;
    fn save(&self, prefs: &Preferences);
}
