//! In-memory record of what one open player is set to play.
//!
//! Every transition that changes the selected season/episode pushes the new
//! position and the recomputed progress to the [`PersistencePort`]. Preference
//! toggles go to the [`PreferenceStore`]. Nothing here returns an error: bad
//! ids fall back to the first season/episode and an empty source list is a
//! valid state with no playable URL.

use std::sync::Arc;

use crate::catalog::{Episode, Season, Title};

use super::index::{EpisodeIndex, percent_of};
use super::ports::{DisplayMode, PersistencePort, PreferenceStore, Preferences};
use super::route::{RouteSelection, route_path};

/// Requested starting point, usually from a deep link or a resume entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialSelection {
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
}

impl InitialSelection {
    pub fn ids(season_id: Option<&str>, episode_id: Option<&str>) -> Self {
        Self {
            season_id: season_id.map(str::to_string),
            episode_id: episode_id.map(str::to_string),
        }
    }

    /// Translate human-readable season/episode numbers into ids.
    ///
    /// Numbers that do not exist in the title are dropped so the machine
    /// applies its usual fallback.
    pub fn from_route(title: &Title, route: RouteSelection) -> Self {
        let Some(season) = title.season_by_number(route.season_number) else {
            return Self::default();
        };
        Self {
            season_id: Some(season.id.clone()),
            episode_id: route
                .episode_number
                .and_then(|number| season.episode_by_number(number))
                .map(|episode| episode.id.clone()),
        }
    }
}

/// Snapshot of the current selection, for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSelection {
    pub season: Option<usize>,
    pub episode: Option<usize>,
    pub source_index: usize,
    pub display_mode: DisplayMode,
    pub autoplay: bool,
}

pub struct PlaybackMachine {
    title: Arc<Title>,
    index: EpisodeIndex,
    season: Option<usize>,
    episode: Option<usize>,
    source_index: usize,
    prefs: Preferences,
    persistence: Arc<dyn PersistencePort>,
    preference_store: Arc<dyn PreferenceStore>,
}

impl std::fmt::Debug for PlaybackMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackMachine")
            .field("title", &self.title.id)
            .field("season", &self.season)
            .field("episode", &self.episode)
            .field("source_index", &self.source_index)
            .field("prefs", &self.prefs)
            .finish_non_exhaustive()
    }
}

impl PlaybackMachine {
    pub fn new(
        title: Arc<Title>,
        initial: InitialSelection,
        persistence: Arc<dyn PersistencePort>,
        preference_store: Arc<dyn PreferenceStore>,
    ) -> Self {
        let index = EpisodeIndex::build(&title);
        let prefs = preference_store.load();
        let mut machine = Self {
            title,
            index,
            season: None,
            episode: None,
            source_index: 0,
            prefs,
            persistence,
            preference_store,
        };
        machine.seed(&initial);
        machine
    }

    fn seed(&mut self, initial: &InitialSelection) {
        let seasons = self.title.seasons();
        if seasons.is_empty() {
            self.season = None;
            self.episode = None;
            self.source_index = 0;
            return;
        }

        let season_idx = initial
            .season_id
            .as_deref()
            .and_then(|id| seasons.iter().position(|season| season.id == id))
            .unwrap_or(0);
        let episodes = &seasons[season_idx].episodes;
        let episode_idx = initial
            .episode_id
            .as_deref()
            .and_then(|id| episodes.iter().position(|episode| episode.id == id))
            .or((!episodes.is_empty()).then_some(0));

        let season_fell_back = initial
            .season_id
            .as_deref()
            .is_some_and(|id| id != seasons[season_idx].id);
        let episode_fell_back = initial.episode_id.as_deref().is_some_and(|id| {
            episode_idx.map(|idx| episodes[idx].id.as_str()) != Some(id)
        });
        if season_fell_back || episode_fell_back {
            tracing::debug!(
                title = %self.title.id,
                requested_season = ?initial.season_id,
                requested_episode = ?initial.episode_id,
                "initial selection not in catalog, falling back"
            );
        }

        self.season = Some(season_idx);
        self.episode = episode_idx;
        self.source_index = 0;
        self.on_selection_changed();
    }

    /// Install a new catalog entity. The episode index is only rebuilt when
    /// the entity actually changed identity.
    pub fn replace_title(&mut self, title: Arc<Title>) {
        if Arc::ptr_eq(&self.title, &title) {
            return;
        }
        let keep = InitialSelection {
            season_id: self.current_season().map(|season| season.id.clone()),
            episode_id: self.current_episode().map(|episode| episode.id.clone()),
        };
        self.index = EpisodeIndex::build(&title);
        self.title = title;
        self.seed(&keep);
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn index(&self) -> &EpisodeIndex {
        &self.index
    }

    pub fn selection(&self) -> PlaybackSelection {
        PlaybackSelection {
            season: self.season,
            episode: self.episode,
            source_index: self.source_index,
            display_mode: self.prefs.display_mode,
            autoplay: self.prefs.autoplay,
        }
    }

    pub fn preferences(&self) -> Preferences {
        self.prefs
    }

    pub fn current_season(&self) -> Option<&Season> {
        self.season.and_then(|idx| self.title.seasons().get(idx))
    }

    pub fn current_episode(&self) -> Option<&Episode> {
        let season = self.current_season()?;
        self.episode.and_then(|idx| season.episodes.get(idx))
    }

    /// Mirrors for the current episode, or the film's own list.
    pub fn current_sources(&self) -> &[String] {
        if !self.title.has_seasons() {
            return self.title.film_sources();
        }
        self.current_episode()
            .map(|episode| episode.video_sources.as_slice())
            .unwrap_or(&[])
    }

    /// URL to hand to the player, `None` when nothing is playable.
    pub fn current_source(&self) -> Option<&str> {
        self.current_sources()
            .get(self.source_index)
            .map(String::as_str)
    }

    pub fn has_prev_episode(&self) -> bool {
        matches!(self.episode, Some(idx) if idx > 0)
    }

    pub fn has_next_episode(&self) -> bool {
        self.next_episode_target().is_some()
    }

    pub fn has_next_season(&self) -> bool {
        matches!(self.season, Some(idx) if idx + 1 < self.title.seasons().len())
    }

    pub fn go_to_prev_episode(&mut self) -> bool {
        match self.episode {
            Some(idx) if idx > 0 => self.apply_selection(self.season, Some(idx - 1)),
            _ => false,
        }
    }

    pub fn go_to_next_episode(&mut self) -> bool {
        match self.next_episode_target() {
            Some((season, episode)) => self.apply_selection(Some(season), Some(episode)),
            None => false,
        }
    }

    fn next_episode_target(&self) -> Option<(usize, usize)> {
        let season_idx = self.season?;
        let episode_idx = self.episode?;
        let seasons = self.title.seasons();
        if episode_idx + 1 < seasons[season_idx].episodes.len() {
            return Some((season_idx, episode_idx + 1));
        }
        if !self.prefs.autoplay {
            return None;
        }
        seasons
            .iter()
            .enumerate()
            .skip(season_idx + 1)
            .find(|(_, season)| !season.episodes.is_empty())
            .map(|(idx, _)| (idx, 0))
    }

    pub fn go_to_last_episode(&mut self) -> bool {
        let Some(season) = self.current_season() else {
            return false;
        };
        let last = season.episodes.len().checked_sub(1);
        if last.is_none() {
            return false;
        }
        // Back to the first mirror even when already on the last episode.
        self.source_index = 0;
        self.apply_selection(self.season, last)
    }

    pub fn go_to_next_season(&mut self) -> bool {
        if !self.has_next_season() {
            return false;
        }
        let next = self.season.map(|idx| idx + 1);
        let first = next
            .and_then(|idx| self.title.seasons().get(idx))
            .and_then(|season| (!season.episodes.is_empty()).then_some(0));
        self.apply_selection(next, first)
    }

    /// Switch season. Unknown ids fall back to the first season. The episode
    /// resets to the season's first one unless the current episode id also
    /// exists in the new season.
    pub fn select_season(&mut self, season_id: &str) -> bool {
        let seasons = self.title.seasons();
        if seasons.is_empty() {
            return false;
        }
        let season_idx = seasons
            .iter()
            .position(|season| season.id == season_id)
            .unwrap_or(0);
        let episodes = &seasons[season_idx].episodes;
        let episode_idx = self
            .current_episode()
            .and_then(|current| episodes.iter().position(|episode| episode.id == current.id))
            .or((!episodes.is_empty()).then_some(0));
        self.apply_selection(Some(season_idx), episode_idx)
    }

    /// Pick an episode of the current season. Unknown ids are ignored.
    pub fn select_episode(&mut self, episode_id: &str) -> bool {
        let Some(season) = self.current_season() else {
            return false;
        };
        let target = season
            .episodes
            .iter()
            .position(|episode| episode.id == episode_id);
        match target {
            Some(idx) => self.apply_selection(self.season, Some(idx)),
            None => false,
        }
    }

    pub fn set_source_index(&mut self, index: usize) -> bool {
        if index >= self.current_sources().len() || index == self.source_index {
            return false;
        }
        self.source_index = index;
        true
    }

    pub fn toggle_autoplay(&mut self) {
        self.prefs.autoplay = !self.prefs.autoplay;
        self.preference_store.save(&self.prefs);
    }

    pub fn toggle_display_mode(&mut self) {
        self.set_display_mode(self.prefs.display_mode.toggled());
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.prefs.display_mode = mode;
        self.preference_store.save(&self.prefs);
    }

    /// `{base}/saison-{n}/episode-{m}` for the current selection.
    pub fn route_path(&self, base: &str) -> Option<String> {
        let season = self.current_season()?;
        let episode = self.current_episode()?;
        Some(route_path(base, season.number, episode.number))
    }

    /// Host is tearing the session down. A film is taken as finished; a
    /// series gets its last selection written once more synchronously.
    pub fn on_unload(&self) {
        if !self.title.has_seasons() {
            self.persistence.beacon_progress(&self.title.id, 100);
            return;
        }
        let (Some(season), Some(episode)) = (self.current_season(), self.current_episode()) else {
            return;
        };
        self.persistence
            .beacon_position(&self.title.id, &season.id, &episode.id);
        if let Some(percent) = self.current_percent() {
            self.persistence.beacon_progress(&self.title.id, percent);
        }
    }

    /// Series progress of the current selection.
    pub fn current_percent(&self) -> Option<u8> {
        if self.index.is_empty() {
            return None;
        }
        let season = self.current_season()?;
        let episode = self.current_episode()?;
        let flat = self.index.index_of(&season.id, &episode.id)?;
        Some(percent_of(flat + 1, self.index.len()))
    }

    fn apply_selection(&mut self, season: Option<usize>, episode: Option<usize>) -> bool {
        if self.season == season && self.episode == episode {
            return false;
        }
        self.season = season;
        self.episode = episode;
        self.source_index = 0;
        self.on_selection_changed();
        true
    }

    fn on_selection_changed(&self) {
        let (Some(season), Some(episode)) = (self.current_season(), self.current_episode()) else {
            return;
        };
        self.persistence
            .update_position(&self.title.id, &season.id, &episode.id);
        if let Some(percent) = self.current_percent() {
            self.persistence.update_progress(&self.title.id, percent);
        }
        tracing::debug!(
            title = %self.title.id,
            season = season.number,
            episode = episode.number,
            "selection changed"
        );
    }
}
