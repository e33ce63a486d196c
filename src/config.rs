use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;

use crate::paths::{catalog_file_path, default_data_dir};

pub const DEFAULT_LOG_FILTER: &str = "reprise=info";
const DEFAULT_PLAYER_BIN: &str = "mpv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub player_bin: PathBuf,
    pub backend: Option<BackendConfig>,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_dir = match non_empty(std::env::var_os("REPRISE_DATA_DIR")) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        Ok(Self::resolve(data_dir, |key| std::env::var_os(key)))
    }

    /// Resolve everything but the data directory from `lookup`.
    pub(crate) fn resolve<F>(data_dir: PathBuf, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let catalog_path = non_empty(lookup("REPRISE_CATALOG"))
            .map(PathBuf::from)
            .unwrap_or_else(|| catalog_file_path(&data_dir));
        let player_bin = resolve_player_bin_from_env(lookup("REPRISE_PLAYER_BIN"));
        let backend = non_empty(lookup("REPRISE_BACKEND_URL"))
            .and_then(|url| url.into_string().ok())
            .map(|url| BackendConfig {
                url,
                api_key: non_empty(lookup("REPRISE_BACKEND_KEY"))
                    .and_then(|key| key.into_string().ok()),
            });
        let log_filter = non_empty(lookup("REPRISE_LOG"))
            .and_then(|filter| filter.into_string().ok())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            data_dir,
            catalog_path,
            player_bin,
            backend,
            log_filter,
        }
    }
}

pub(crate) fn resolve_player_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match non_empty(env_value) {
        Some(value) => PathBuf::from(value),
        None => PathBuf::from(DEFAULT_PLAYER_BIN),
    }
}

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), OsString::from(value)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_live_under_the_data_dir() {
        let config = Config::resolve(PathBuf::from("/data/reprise"), lookup_from(&[]));
        assert_eq!(config.catalog_path, PathBuf::from("/data/reprise/catalog.json"));
        assert_eq!(config.player_bin, PathBuf::from("mpv"));
        assert_eq!(config.backend, None);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn backend_is_enabled_by_url() {
        let config = Config::resolve(
            PathBuf::from("/data"),
            lookup_from(&[
                ("REPRISE_BACKEND_URL", "https://db.example/rest/v1"),
                ("REPRISE_BACKEND_KEY", ""),
                ("REPRISE_PLAYER_BIN", "/opt/bin/player"),
            ]),
        );
        assert_eq!(
            config.backend,
            Some(BackendConfig {
                url: "https://db.example/rest/v1".to_string(),
                api_key: None,
            })
        );
        assert_eq!(config.player_bin, PathBuf::from("/opt/bin/player"));
    }

    #[test]
    fn empty_player_override_uses_default() {
        assert_eq!(
            resolve_player_bin_from_env(Some(OsString::new())),
            PathBuf::from("mpv")
        );
    }
}
