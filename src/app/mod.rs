mod format;
mod launch;
mod tui;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::catalog::{CatalogReader, JsonCatalog, Title};
use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::db::Database;
use crate::http::RestClient;
use crate::paths::database_file_path;
use crate::playback::{
    InitialSelection, PersistencePort, PreferenceStore, ProgressStore, ProgressWriter,
    RouteSelection, SHORTCUTS, continue_watching, parse_route,
};
use crate::remote::{RestCatalog, RestStore};

use self::format::{describe_next, kind_label, truncate};

/// Everything a screen or command needs, wired from the configuration.
pub(crate) struct Services {
    pub(crate) config: Config,
    pub(crate) catalog: Box<dyn CatalogReader>,
    pub(crate) persistence: Arc<ProgressWriter>,
    pub(crate) preferences: Arc<dyn PreferenceStore>,
}

impl Services {
    fn open(config: Config) -> Result<Self> {
        let db = Arc::new(open_db(&config)?);
        let preferences: Arc<dyn PreferenceStore> = db.clone();

        let (catalog, store): (Box<dyn CatalogReader>, Arc<dyn ProgressStore>) =
            match &config.backend {
                Some(backend) => {
                    tracing::info!(url = %backend.url, "using remote backend");
                    let client = RestClient::new(
                        &backend.url,
                        backend.api_key.clone(),
                        Duration::from_secs(3),
                        Duration::from_secs(5),
                    );
                    let catalog: Box<dyn CatalogReader> =
                        Box::new(RestCatalog::new(client.clone()));
                    let store: Arc<dyn ProgressStore> =
                        Arc::new(RestStore::new(client.with_retries(1, Duration::ZERO)));
                    (catalog, store)
                }
                None => {
                    let catalog: Box<dyn CatalogReader> =
                        Box::new(JsonCatalog::open(&config.catalog_path)?);
                    let store: Arc<dyn ProgressStore> = db;
                    (catalog, store)
                }
            };

        Ok(Self {
            config,
            catalog,
            persistence: Arc::new(ProgressWriter::spawn(store)),
            preferences,
        })
    }

    pub(crate) fn persistence_port(&self) -> Arc<dyn PersistencePort> {
        self.persistence.clone()
    }

    pub(crate) fn require_title(&self, title_id: &str) -> Result<Title> {
        self.catalog
            .title(title_id)?
            .ok_or_else(|| anyhow!("no title with id '{title_id}' in the catalog"))
    }

    /// Where to open a title when no explicit season/episode was requested.
    pub(crate) fn stored_selection(&self, title_id: &str) -> InitialSelection {
        self.persistence
            .read_positions()
            .remove(title_id)
            .map(|position| InitialSelection {
                season_id: position.season_id,
                episode_id: position.episode_id,
            })
            .unwrap_or_default()
    }
}

pub fn run(cli: Cli, config: Config) -> Result<()> {
    if let Some(Command::Keys) = cli.command {
        run_keys();
        return Ok(());
    }

    let services = Services::open(config)?;
    match cli.command {
        Some(Command::Watch {
            title_id,
            season,
            episode,
            route,
        }) => run_watch(&services, &title_id, season, episode, route.as_deref())?,
        Some(Command::Resume) => run_resume(&services)?,
        Some(Command::Catalog) => run_catalog(&services)?,
        Some(Command::Keys) => run_keys(),
        Some(Command::Tui) | None => tui::run_dashboard(&services)?,
    }
    services.persistence.flush();
    Ok(())
}

fn run_watch(
    services: &Services,
    title_id: &str,
    season: Option<u32>,
    episode: Option<u32>,
    route: Option<&str>,
) -> Result<()> {
    let title = services.require_title(title_id)?;
    let requested = match (route, season) {
        (Some(path), _) => Some(
            parse_route(path)
                .with_context(|| format!("'{path}' has no saison-N/episode-M segment"))?,
        ),
        (None, Some(season_number)) => Some(RouteSelection {
            season_number,
            episode_number: episode,
        }),
        (None, None) => None,
    };
    let initial = match requested {
        Some(selection) => InitialSelection::from_route(&title, selection),
        None => services.stored_selection(title_id),
    };
    tui::run_player(services, title, initial)
}

fn run_resume(services: &Services) -> Result<()> {
    let progress = services.persistence.read_progress();
    let positions = services.persistence.read_positions();
    let items = continue_watching(services.catalog.as_ref(), &progress, &positions);
    if items.is_empty() {
        println!("Nothing to continue yet. Run `reprise watch <title-id>` first.");
        return Ok(());
    }

    println!("{:<20} {:<36} {:<22} {:<10}", "ID", "TITLE", "PROGRESS", "NEXT");
    for item in items {
        let next = match services.catalog.title(&item.title_id)? {
            Some(title) => describe_next(&title, item.next.as_ref()),
            None => "-".to_string(),
        };
        println!(
            "{:<20} {:<36} {:<22} {:<10}",
            truncate(&item.title_id, 20),
            truncate(&item.title_name, 36),
            item.label,
            next
        );
    }
    Ok(())
}

fn run_catalog(services: &Services) -> Result<()> {
    let titles = services.catalog.titles()?;
    if titles.is_empty() {
        println!("The catalog is empty.");
        return Ok(());
    }

    println!("{:<20} {:<40} {:<8} {:<8}", "ID", "TITLE", "KIND", "EPISODES");
    for title in titles {
        let episodes = if title.has_seasons() {
            title.total_episodes().to_string()
        } else {
            "-".to_string()
        };
        println!(
            "{:<20} {:<40} {:<8} {:<8}",
            truncate(&title.id, 20),
            truncate(&title.name, 40),
            kind_label(&title),
            episodes
        );
    }
    Ok(())
}

fn run_keys() {
    for shortcut in SHORTCUTS {
        println!("{:<10} {}", shortcut.keys, shortcut.description);
    }
}

fn open_db(config: &Config) -> Result<Database> {
    let db = Database::open(&database_file_path(&config.data_dir))?;
    db.migrate()?;
    Ok(db)
}
