use std::collections::HashMap;

use crate::catalog::Title;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EpisodeRef {
    pub season_id: String,
    pub episode_id: String,
}

/// All episodes of a title flattened into display order.
///
/// The order is exactly the order of the catalog's seasons and episodes; the
/// index never re-sorts.
#[derive(Debug, Clone, Default)]
pub struct EpisodeIndex {
    entries: Vec<EpisodeRef>,
    positions: HashMap<(String, String), usize>,
}

impl EpisodeIndex {
    pub fn build(title: &Title) -> Self {
        let mut entries = Vec::with_capacity(title.total_episodes());
        let mut positions = HashMap::with_capacity(entries.capacity());
        for season in title.seasons() {
            for episode in &season.episodes {
                positions
                    .entry((season.id.clone(), episode.id.clone()))
                    .or_insert(entries.len());
                entries.push(EpisodeRef {
                    season_id: season.id.clone(),
                    episode_id: episode.id.clone(),
                });
            }
        }
        Self { entries, positions }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EpisodeRef> {
        self.entries.get(index)
    }

    /// Flat position of an episode, `None` when the pair is not in the title.
    pub fn index_of(&self, season_id: &str, episode_id: &str) -> Option<usize> {
        self.positions
            .get(&(season_id.to_string(), episode_id.to_string()))
            .copied()
    }
}

/// `round(100 * watched / total)`, rounding halves up. Zero when `total` is zero.
pub fn percent_of(watched: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let watched = watched.min(total) as u64;
    let total = total as u64;
    ((200 * watched + total) / (2 * total)) as u8
}
