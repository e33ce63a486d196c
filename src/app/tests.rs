use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::catalog::{Episode, JsonCatalog, Season, Title, TitleKind};
use crate::config::Config;
use crate::db::Database;
use crate::playback::{
    EpisodeRef, FocusTarget, InitialSelection, Key, PersistencePort, ProgressWriter,
};

use super::Services;
use super::format::*;
use super::launch::{LaunchMode, player_args};
use super::tui::player::{key_press, with_player_screen};
use super::tui::{Dashboard, DashboardView};

fn series() -> Title {
    let episode = |id: &str, number: u32| Episode {
        id: id.to_string(),
        number,
        title: format!("Episode {number}"),
        video_sources: vec![format!("https://cdn.example.net/{id}.m3u8")],
    };
    Title {
        id: "show".to_string(),
        name: "Show".to_string(),
        kind: TitleKind::Episodic {
            seasons: vec![
                Season {
                    id: "s1".to_string(),
                    number: 1,
                    episodes: vec![episode("e1", 1), episode("e2", 2)],
                },
                Season {
                    id: "s2".to_string(),
                    number: 2,
                    episodes: vec![episode("e3", 1)],
                },
            ],
        },
    }
}

fn film() -> Title {
    Title {
        id: "film".to_string(),
        name: "Film".to_string(),
        kind: TitleKind::Film {
            video_sources: vec!["https://a.example/film.mp4".to_string()],
        },
    }
}

#[test]
fn truncate_adds_ellipsis_only_when_needed() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer title", 10), "a much ...");
    assert_eq!(truncate("épisodé", 7), "épisodé");
}

#[test]
fn kind_label_follows_title_shape() {
    assert_eq!(kind_label(&series()), "series");
    assert_eq!(kind_label(&film()), "film");
}

#[test]
fn episode_code_uses_catalog_numbers() {
    let title = series();
    assert_eq!(episode_code(&title, "s2", "e3").as_deref(), Some("S2E1"));
    assert_eq!(episode_code(&title, "s1", "e3"), None);
    assert_eq!(episode_code(&title, "gone", "e1"), None);
}

#[test]
fn describe_next_falls_back_to_dash() {
    let title = series();
    let next = EpisodeRef {
        season_id: "s1".to_string(),
        episode_id: "e2".to_string(),
    };
    assert_eq!(describe_next(&title, Some(&next)), "S1E2");
    assert_eq!(describe_next(&title, None), "-");
}

#[test]
fn source_label_shows_host_and_one_based_index() {
    assert_eq!(
        source_label(0, "https://cdn.example.net/e1.m3u8"),
        "1 cdn.example.net"
    );
    assert_eq!(source_label(2, "local-file.mp4"), "3 local-file.mp4");
}

#[test]
fn player_args_per_launch_mode() {
    let url = "https://a.example/film.mp4";
    assert_eq!(
        player_args(LaunchMode::Window, url),
        vec!["--force-window=immediate", url]
    );
    assert_eq!(
        player_args(LaunchMode::Fullscreen, url),
        vec!["--force-window=immediate", "--fs", url]
    );
    let mini = player_args(LaunchMode::MiniPlayer, url);
    assert!(mini.contains(&"--ontop".to_string()));
    assert_eq!(mini.last().map(String::as_str), Some(url));
}

#[test]
fn key_press_carries_shift_and_focus() {
    let event = KeyEvent::new(KeyCode::Char('N'), KeyModifiers::SHIFT);
    let press = key_press(&event, FocusTarget::Page);
    assert_eq!(press.key, Key::Char('N'));
    assert!(press.shift);
    assert_eq!(press.focus, FocusTarget::Page);

    let event = KeyEvent::new(KeyCode::Char('n'), KeyModifiers::NONE);
    let press = key_press(&event, FocusTarget::TextInput);
    assert!(!press.shift);
    assert_eq!(press.focus, FocusTarget::TextInput);
}

#[test]
fn key_press_maps_escape_and_other_keys() {
    let escape = key_press(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE), FocusTarget::Page);
    assert_eq!(escape.key, Key::Escape);

    let arrow = key_press(&KeyEvent::new(KeyCode::Left, KeyModifiers::NONE), FocusTarget::Page);
    assert_eq!(arrow.key, Key::Other);
}

fn services_with(titles: Vec<Title>) -> Services {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    Services {
        config: Config {
            data_dir: PathBuf::from("/nonexistent"),
            catalog_path: PathBuf::from("/nonexistent/catalog.json"),
            player_bin: PathBuf::from("mpv"),
            backend: None,
            log_filter: "off".to_string(),
        },
        catalog: Box::new(JsonCatalog::from_titles(titles)),
        persistence: Arc::new(ProgressWriter::spawn(db.clone())),
        preferences: db,
    }
}

#[test]
fn player_screen_beacons_last_selection_when_the_loop_fails() {
    let services = services_with(vec![series()]);
    let result = with_player_screen(
        &services,
        series(),
        InitialSelection::ids(Some("s1"), Some("e1")),
        |screen| {
            assert!(screen.machine.go_to_next_episode());
            bail!("terminal went away")
        },
    );
    assert!(result.is_err());

    // The beacon is synchronous, so the store is current before any flush.
    let positions = services.persistence.read_positions();
    let stored = positions.get("show").expect("position beaconed");
    assert_eq!(stored.season_id.as_deref(), Some("s1"));
    assert_eq!(stored.episode_id.as_deref(), Some("e2"));
    assert_eq!(services.persistence.read_progress().get("show"), Some(&67));
}

#[test]
fn player_screen_skips_film_beacon_when_nothing_played() {
    let services = services_with(vec![film()]);
    with_player_screen(&services, film(), InitialSelection::default(), |_| Ok(()))
        .expect("clean close");
    assert!(services.persistence.read_progress().get("film").is_none());
}

#[test]
fn dashboard_lists_titles_with_stored_progress() {
    let services = services_with(vec![series(), film()]);
    services.persistence.beacon_position("show", "s1", "e1");
    services.persistence.beacon_progress("show", 33);

    let dashboard = Dashboard::load(&services).expect("dashboard loads");
    assert_eq!(dashboard.view, DashboardView::Continue);
    assert_eq!(dashboard.titles.len(), 2);
    assert_eq!(dashboard.rows.len(), 1);
    assert_eq!(dashboard.rows[0].descriptor.title_id, "show");
    assert_eq!(dashboard.rows[0].next_label, "S1E2");
}

#[test]
fn dashboard_opens_on_catalog_when_nothing_is_started() {
    let services = services_with(vec![series(), film()]);
    let dashboard = Dashboard::load(&services).expect("dashboard loads");
    assert_eq!(dashboard.view, DashboardView::Catalog);
    assert!(dashboard.rows.is_empty());
}
