//! Continue-watching descriptors.
//!
//! Stored percentages go stale when a catalog grows, so a descriptor is always
//! re-derived from the stored position against the current catalog shape.
//! Everything here is pure.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::catalog::{CatalogReader, Title};

use super::index::{EpisodeIndex, EpisodeRef, percent_of};
use super::ports::WatchPosition;

pub const COMPLETE_LABEL: &str = "Terminé";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeDescriptor {
    pub title_id: String,
    pub title_name: String,
    pub progress: u8,
    pub label: String,
    pub has_new_episodes: bool,
    pub has_new_season: bool,
    /// First unwatched episode, if any.
    pub next: Option<EpisodeRef>,
}

impl ResumeDescriptor {
    pub fn is_complete(&self) -> bool {
        self.progress == 100
    }

    fn rank(&self) -> u8 {
        if self.has_new_season {
            0
        } else if self.has_new_episodes {
            1
        } else if !self.is_complete() {
            2
        } else {
            3
        }
    }
}

fn plain_label(progress: u8) -> String {
    if progress == 100 {
        COMPLETE_LABEL.to_string()
    } else {
        format!("{progress}%")
    }
}

pub fn describe(
    title: &Title,
    stored_percent: Option<u8>,
    position: Option<&WatchPosition>,
) -> ResumeDescriptor {
    let stored = stored_percent.unwrap_or(0).min(100);
    let index = EpisodeIndex::build(title);
    let mut descriptor = ResumeDescriptor {
        title_id: title.id.clone(),
        title_name: title.name.clone(),
        progress: stored,
        label: plain_label(stored),
        has_new_episodes: false,
        has_new_season: false,
        next: None,
    };
    if index.is_empty() {
        return descriptor;
    }

    let flat = position.and_then(|pos| match (&pos.season_id, &pos.episode_id) {
        (Some(season_id), Some(episode_id)) => index.index_of(season_id, episode_id),
        _ => None,
    });
    let watched = flat.map(|idx| idx + 1).unwrap_or(0);
    let actual = percent_of(watched, index.len());
    descriptor.progress = actual;
    descriptor.next = index.get(watched).cloned();

    // Content only counts as new when the stored position still resolves;
    // a removed or reordered season leaves nothing to compare against.
    if stored == 100 && actual < 100 && flat.is_some() {
        let seasons = title.seasons();
        let stored_season = position
            .and_then(|pos| pos.season_id.as_deref())
            .and_then(|id| seasons.iter().position(|season| season.id == id));
        if let Some(season_idx) = stored_season {
            if season_idx + 1 < seasons.len() {
                descriptor.has_new_season = true;
                let new_season = &seasons[season_idx + 1];
                descriptor.next = new_season.episodes.first().map(|episode| EpisodeRef {
                    season_id: new_season.id.clone(),
                    episode_id: episode.id.clone(),
                });
            } else {
                descriptor.has_new_episodes = true;
            }
        }
    }

    descriptor.label = if actual == 100 {
        COMPLETE_LABEL.to_string()
    } else if descriptor.has_new_season {
        format!("{actual}% • NEW SEASON")
    } else if descriptor.has_new_episodes {
        format!("{actual}% • NEW EP")
    } else {
        format!("{actual}%")
    };
    descriptor
}

/// New seasons first, then new episodes, then unfinished titles by
/// descending progress, then finished titles. Ties keep their input order.
pub fn sort_continue_watching(items: &mut [ResumeDescriptor]) {
    items.sort_by(|left, right| match left.rank().cmp(&right.rank()) {
        Ordering::Equal if left.rank() == 2 => right.progress.cmp(&left.progress),
        other => other,
    });
}

/// Build the continue-watching list from stored progress and positions.
///
/// Titles with neither a stored progress nor a stored position are not
/// listed. Stored ids that are gone from the catalog are skipped.
pub fn continue_watching(
    catalog: &dyn CatalogReader,
    progress: &HashMap<String, u8>,
    positions: &HashMap<String, WatchPosition>,
) -> Vec<ResumeDescriptor> {
    let mut ids: Vec<&String> = progress.keys().chain(positions.keys()).collect();
    ids.sort();
    ids.dedup();

    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        let title = match catalog.title(id) {
            Ok(Some(title)) => title,
            Ok(None) => {
                tracing::warn!(title = %id, "stored progress for a title missing from the catalog");
                continue;
            }
            Err(err) => {
                tracing::warn!(title = %id, error = %err, "catalog lookup failed");
                continue;
            }
        };
        items.push(describe(
            &title,
            progress.get(id.as_str()).copied(),
            positions.get(id.as_str()),
        ));
    }
    sort_continue_watching(&mut items);
    items
}
