//! Backend-as-a-service adapters: progress store and catalog over a
//! PostgREST-style REST API.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::catalog::{CatalogReader, Title, parse_titles};
use crate::http::RestClient;
use crate::playback::{ProgressStore, WatchPosition};

#[derive(Debug, Deserialize)]
struct ProgressRow {
    title_id: String,
    percent: i64,
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    title_id: String,
    season_id: Option<String>,
    episode_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestStore {
    client: RestClient,
}

impl RestStore {
    pub(crate) fn new(client: RestClient) -> Self {
        Self { client }
    }
}

impl ProgressStore for RestStore {
    fn write_progress(&self, title_id: &str, percent: u8, seq: i64) -> Result<()> {
        self.client
            .upsert_json(
                "watch_progress",
                &json!({ "title_id": title_id, "percent": percent.min(100), "seq": seq }),
            )
            .with_context(|| format!("failed to store progress for {title_id}"))
    }

    fn write_position(&self, position: &WatchPosition, seq: i64) -> Result<()> {
        self.client
            .upsert_json(
                "watch_position",
                &json!({
                    "title_id": position.title_id,
                    "season_id": position.season_id,
                    "episode_id": position.episode_id,
                    "seq": seq,
                }),
            )
            .with_context(|| format!("failed to store position for {}", position.title_id))
    }

    fn load_progress(&self) -> Result<HashMap<String, u8>> {
        let raw = self
            .client
            .get_text("watch_progress", &[("select", "title_id,percent")])?;
        let rows: Vec<ProgressRow> =
            serde_json::from_str(&raw).context("invalid watch_progress payload")?;
        Ok(rows
            .into_iter()
            .map(|row| (row.title_id, row.percent.clamp(0, 100) as u8))
            .collect())
    }

    fn load_positions(&self) -> Result<HashMap<String, WatchPosition>> {
        let raw = self.client.get_text(
            "watch_position",
            &[("select", "title_id,season_id,episode_id")],
        )?;
        let rows: Vec<PositionRow> =
            serde_json::from_str(&raw).context("invalid watch_position payload")?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.title_id.clone(),
                    WatchPosition {
                        title_id: row.title_id,
                        season_id: row.season_id,
                        episode_id: row.episode_id,
                    },
                )
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct RestCatalog {
    client: RestClient,
}

impl RestCatalog {
    pub(crate) fn new(client: RestClient) -> Self {
        Self { client }
    }

    fn fetch(&self, query: &[(&str, &str)]) -> Result<Vec<Title>> {
        let raw = self.client.get_text("titles", query)?;
        parse_titles(&raw)
    }
}

impl CatalogReader for RestCatalog {
    fn title(&self, id: &str) -> Result<Option<Title>> {
        let filter = format!("eq.{id}");
        let titles = self.fetch(&[("select", "*"), ("id", filter.as_str())])?;
        Ok(titles.into_iter().next())
    }

    fn titles(&self) -> Result<Vec<Title>> {
        self.fetch(&[("select", "*")])
    }
}
