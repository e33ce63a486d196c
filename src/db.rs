use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::playback::{DisplayMode, PreferenceStore, Preferences, ProgressStore, WatchPosition};

const PREF_DISPLAY_MODE: &str = "display_mode";
const PREF_AUTOPLAY: &str = "autoplay";

pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS watch_progress (
                title_id TEXT PRIMARY KEY,
                percent INTEGER NOT NULL CHECK (percent BETWEEN 0 AND 100),
                seq INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS watch_position (
                title_id TEXT PRIMARY KEY,
                season_id TEXT,
                episode_id TEXT,
                seq INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO preferences (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    pub fn preference(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn load_preferences(&self) -> Result<Preferences> {
        let defaults = Preferences::default();
        let display_mode = self
            .preference(PREF_DISPLAY_MODE)?
            .and_then(|raw| DisplayMode::parse(&raw))
            .unwrap_or(defaults.display_mode);
        let autoplay = self
            .preference(PREF_AUTOPLAY)?
            .map(|raw| raw == "1")
            .unwrap_or(defaults.autoplay);
        Ok(Preferences {
            display_mode,
            autoplay,
        })
    }
}

impl ProgressStore for Database {
    fn write_progress(&self, title_id: &str, percent: u8, seq: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                r#"
                INSERT INTO watch_progress (title_id, percent, seq, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(title_id) DO UPDATE SET
                    percent = excluded.percent,
                    seq = excluded.seq,
                    updated_at = excluded.updated_at
                WHERE excluded.seq > watch_progress.seq
                "#,
                params![title_id, percent.min(100), seq, now],
            )
            .with_context(|| format!("failed to store progress for {title_id}"))?;
        Ok(())
    }

    fn write_position(&self, position: &WatchPosition, seq: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                r#"
                INSERT INTO watch_position (title_id, season_id, episode_id, seq, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(title_id) DO UPDATE SET
                    season_id = excluded.season_id,
                    episode_id = excluded.episode_id,
                    seq = excluded.seq,
                    updated_at = excluded.updated_at
                WHERE excluded.seq > watch_position.seq
                "#,
                params![
                    position.title_id,
                    position.season_id,
                    position.episode_id,
                    seq,
                    now
                ],
            )
            .with_context(|| format!("failed to store position for {}", position.title_id))?;
        Ok(())
    }

    fn load_progress(&self) -> Result<HashMap<String, u8>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT title_id, percent FROM watch_progress")?;
        let rows = stmt.query_map([], |row| {
            let percent: i64 = row.get(1)?;
            Ok((row.get::<_, String>(0)?, percent.clamp(0, 100) as u8))
        })?;

        let mut out = HashMap::new();
        for row in rows {
            let (title_id, percent) = row?;
            out.insert(title_id, percent);
        }
        Ok(out)
    }

    fn load_positions(&self) -> Result<HashMap<String, WatchPosition>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT title_id, season_id, episode_id FROM watch_position")?;
        let rows = stmt.query_map([], |row| {
            Ok(WatchPosition {
                title_id: row.get(0)?,
                season_id: row.get(1)?,
                episode_id: row.get(2)?,
            })
        })?;

        let mut out = HashMap::new();
        for row in rows {
            let position = row?;
            out.insert(position.title_id.clone(), position);
        }
        Ok(out)
    }
}

impl PreferenceStore for Database {
    fn load(&self) -> Preferences {
        self.load_preferences().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to read preferences, using defaults");
            Preferences::default()
        })
    }

    fn save(&self, prefs: &Preferences) {
        let result = self
            .set_preference(PREF_DISPLAY_MODE, prefs.display_mode.as_str())
            .and_then(|()| {
                self.set_preference(PREF_AUTOPLAY, if prefs.autoplay { "1" } else { "0" })
            });
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to store preferences");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(title_id: &str, season_id: &str, episode_id: &str) -> WatchPosition {
        WatchPosition {
            title_id: title_id.to_string(),
            season_id: Some(season_id.to_string()),
            episode_id: Some(episode_id.to_string()),
        }
    }

    #[test]
    fn older_progress_write_never_replaces_newer_one() {
        let db = Database::open_in_memory().expect("in-memory db");
        db.write_progress("show", 40, 20).expect("write newer");
        db.write_progress("show", 10, 10).expect("write older");
        assert_eq!(db.load_progress().expect("load").get("show"), Some(&40));

        db.write_progress("show", 50, 30).expect("write newest");
        assert_eq!(db.load_progress().expect("load").get("show"), Some(&50));
    }

    #[test]
    fn older_position_write_never_replaces_newer_one() {
        let db = Database::open_in_memory().expect("in-memory db");
        db.write_position(&position("show", "s1", "e3"), 5)
            .expect("write newer");
        db.write_position(&position("show", "s1", "e2"), 4)
            .expect("write older");
        let positions = db.load_positions().expect("load");
        assert_eq!(positions.get("show"), Some(&position("show", "s1", "e3")));
    }

    #[test]
    fn preferences_default_until_saved() {
        let db = Database::open_in_memory().expect("in-memory db");
        assert_eq!(PreferenceStore::load(&db), Preferences::default());

        let prefs = Preferences {
            display_mode: DisplayMode::Cinema,
            autoplay: false,
        };
        db.save(&prefs);
        assert_eq!(PreferenceStore::load(&db), prefs);
    }

    #[test]
    fn unknown_display_mode_value_falls_back_to_default() {
        let db = Database::open_in_memory().expect("in-memory db");
        db.set_preference(PREF_DISPLAY_MODE, "theater")
            .expect("set raw preference");
        assert_eq!(
            PreferenceStore::load(&db).display_mode,
            DisplayMode::Default
        );
    }
}
