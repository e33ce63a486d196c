//! Catalog entities and the boundary where raw catalog records are ingested.
//!
//! The raw feed labels titles with free-form kind strings. They are resolved
//! here, once, into [`TitleKind`] so the rest of the crate only ever asks
//! whether a title has seasons.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    pub number: u32,
    pub title: String,
    pub video_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    pub id: String,
    pub number: u32,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleKind {
    Film { video_sources: Vec<String> },
    Episodic { seasons: Vec<Season> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub id: String,
    pub name: String,
    pub kind: TitleKind,
}

impl Title {
    pub fn has_seasons(&self) -> bool {
        matches!(self.kind, TitleKind::Episodic { .. })
    }

    /// Seasons in display order; empty for a film.
    pub fn seasons(&self) -> &[Season] {
        match &self.kind {
            TitleKind::Episodic { seasons } => seasons,
            TitleKind::Film { .. } => &[],
        }
    }

    pub fn film_sources(&self) -> &[String] {
        match &self.kind {
            TitleKind::Film { video_sources } => video_sources,
            TitleKind::Episodic { .. } => &[],
        }
    }

    pub fn total_episodes(&self) -> usize {
        self.seasons().iter().map(|season| season.episodes.len()).sum()
    }

    pub fn season_by_number(&self, number: u32) -> Option<&Season> {
        self.seasons().iter().find(|season| season.number == number)
    }
}

impl Season {
    pub fn episode_by_number(&self, number: u32) -> Option<&Episode> {
        self.episodes.iter().find(|episode| episode.number == number)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("title '{id}' has unknown kind '{kind}'")]
    UnknownKind { id: String, kind: String },
    #[error("catalog record is missing an id ({context})")]
    MissingId { context: String },
}

/// Rows from a REST backend carry `null` where a JSON file would omit the key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTitle {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub video_sources: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seasons: Vec<RawSeason>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSeason {
    pub id: String,
    pub number: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub episodes: Vec<RawEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEpisode {
    pub id: String,
    pub number: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub video_sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindLabel {
    Film,
    Episodic,
}

fn resolve_kind_label(raw: &str) -> Option<KindLabel> {
    match raw.trim().to_lowercase().as_str() {
        "film" | "movie" => Some(KindLabel::Film),
        "série" | "serie" | "series" | "animé" | "anime" | "émission" | "emission" | "show" => {
            Some(KindLabel::Episodic)
        }
        _ => None,
    }
}

impl TryFrom<RawTitle> for Title {
    type Error = CatalogError;

    fn try_from(raw: RawTitle) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err(CatalogError::MissingId {
                context: format!("title '{}'", raw.title),
            });
        }
        let label = resolve_kind_label(&raw.kind).ok_or_else(|| CatalogError::UnknownKind {
            id: raw.id.clone(),
            kind: raw.kind.clone(),
        })?;

        let kind = match label {
            KindLabel::Film => TitleKind::Film {
                video_sources: clean_sources(raw.video_sources),
            },
            KindLabel::Episodic => {
                let mut seasons = Vec::with_capacity(raw.seasons.len());
                for season in raw.seasons {
                    seasons.push(ingest_season(&raw.id, season)?);
                }
                TitleKind::Episodic { seasons }
            }
        };

        Ok(Title {
            id: raw.id,
            name: raw.title,
            kind,
        })
    }
}

fn ingest_season(title_id: &str, raw: RawSeason) -> Result<Season, CatalogError> {
    if raw.id.trim().is_empty() {
        return Err(CatalogError::MissingId {
            context: format!("season {} of '{title_id}'", raw.number),
        });
    }
    let mut episodes = Vec::with_capacity(raw.episodes.len());
    for episode in raw.episodes {
        if episode.id.trim().is_empty() {
            return Err(CatalogError::MissingId {
                context: format!(
                    "episode {} of season {} of '{title_id}'",
                    episode.number, raw.number
                ),
            });
        }
        episodes.push(Episode {
            id: episode.id,
            number: episode.number,
            title: episode.title,
            video_sources: clean_sources(episode.video_sources),
        });
    }
    Ok(Season {
        id: raw.id,
        number: raw.number,
        episodes,
    })
}

fn clean_sources(sources: Vec<String>) -> Vec<String> {
    sources
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

pub(crate) fn parse_titles(raw: &str) -> Result<Vec<Title>> {
    let records: Vec<RawTitle> =
        serde_json::from_str(raw).context("catalog is not a JSON array of titles")?;
    let mut titles = Vec::with_capacity(records.len());
    for record in records {
        titles.push(Title::try_from(record)?);
    }
    Ok(titles)
}

/// Read-only access to catalog titles.
pub trait CatalogReader {
    fn title(&self, id: &str) -> Result<Option<Title>>;
    fn titles(&self) -> Result<Vec<Title>>;
}

/// Catalog backed by a JSON file, loaded once on open.
#[derive(Debug)]
pub struct JsonCatalog {
    titles: Vec<Title>,
    by_id: HashMap<String, usize>,
}

impl JsonCatalog {
    pub fn open(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog at {}", path.display()))?;
        let titles = parse_titles(&raw)
            .with_context(|| format!("failed to load catalog at {}", path.display()))?;
        tracing::info!(path = %path.display(), titles = titles.len(), "catalog loaded");
        Ok(Self::from_titles(titles))
    }

    pub(crate) fn from_titles(titles: Vec<Title>) -> Self {
        let by_id = titles
            .iter()
            .enumerate()
            .map(|(idx, title)| (title.id.clone(), idx))
            .collect();
        Self { titles, by_id }
    }
}

impl CatalogReader for JsonCatalog {
    fn title(&self, id: &str) -> Result<Option<Title>> {
        Ok(self.by_id.get(id).map(|&idx| self.titles[idx].clone()))
    }

    fn titles(&self) -> Result<Vec<Title>> {
        Ok(self.titles.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"id": "film-1", "title": "Le Film", "type": "Film", "videoSources": ["https://a/1", "  "]},
        {"id": "show-1", "title": "La Série", "type": "Animé", "seasons": [
            {"id": "s1", "number": 1, "episodes": [
                {"id": "e1", "number": 1, "title": "Pilot", "videoSources": ["https://b/1"]},
                {"id": "e2", "number": 2, "title": "Two"}
            ]}
        ]},
        {"id": "show-2", "title": "Empty", "type": "Émission"}
    ]"#;

    #[test]
    fn parse_titles_resolves_kind_labels_once() {
        let titles = parse_titles(SAMPLE).expect("sample catalog should parse");
        assert_eq!(titles.len(), 3);
        assert!(!titles[0].has_seasons());
        assert_eq!(titles[0].film_sources(), ["https://a/1".to_string()]);
        assert!(titles[1].has_seasons());
        assert_eq!(titles[1].total_episodes(), 2);
        assert!(titles[2].has_seasons());
        assert_eq!(titles[2].total_episodes(), 0);
    }

    #[test]
    fn null_collections_parse_as_empty() {
        let raw = r#"[
            {"id": "film-2", "title": null, "type": "Film", "videoSources": null, "seasons": null},
            {"id": "show-3", "title": "Nulls", "type": "Série", "videoSources": null, "seasons": [
                {"id": "s1", "number": 1, "episodes": null},
                {"id": "s2", "number": 2, "episodes": [
                    {"id": "e1", "number": 1, "title": null, "videoSources": null}
                ]}
            ]}
        ]"#;
        let titles = parse_titles(raw).expect("null collections should parse");
        assert_eq!(titles.len(), 2);
        assert!(titles[0].film_sources().is_empty());
        assert_eq!(titles[0].name, "");
        assert_eq!(titles[1].seasons().len(), 2);
        assert!(titles[1].seasons()[0].episodes.is_empty());
        assert!(titles[1].seasons()[1].episodes[0].video_sources.is_empty());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let raw = RawTitle {
            id: "x".to_string(),
            title: "X".to_string(),
            kind: "Podcast".to_string(),
            video_sources: Vec::new(),
            seasons: Vec::new(),
        };
        assert_eq!(
            Title::try_from(raw),
            Err(CatalogError::UnknownKind {
                id: "x".to_string(),
                kind: "Podcast".to_string(),
            })
        );
    }

    #[test]
    fn kind_labels_are_case_insensitive() {
        assert_eq!(resolve_kind_label("SÉRIE"), Some(KindLabel::Episodic));
        assert_eq!(resolve_kind_label(" film "), Some(KindLabel::Film));
        assert_eq!(resolve_kind_label(""), None);
    }

    #[test]
    fn json_catalog_looks_up_by_id() {
        let titles = parse_titles(SAMPLE).expect("sample catalog should parse");
        let catalog = JsonCatalog::from_titles(titles);
        let show = catalog
            .title("show-1")
            .expect("lookup should succeed")
            .expect("show should exist");
        assert_eq!(show.name, "La Série");
        assert!(catalog.title("missing").expect("lookup").is_none());
    }
}
