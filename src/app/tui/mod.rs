pub(super) mod player;
mod render;
mod session;

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::widgets::TableState;

use crate::catalog::Title;
use crate::playback::{InitialSelection, PersistencePort, ResumeDescriptor, continue_watching};

use super::Services;
use super::format::describe_next;

use self::player::run_player_screen;
use self::render::draw_dashboard;
use self::session::TuiSession;

pub(super) const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DashboardView {
    Continue,
    Catalog,
}

impl DashboardView {
    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Continue => "CONTINUE",
            Self::Catalog => "CATALOG",
        }
    }

    fn toggled(self) -> Self {
        match self {
            Self::Continue => Self::Catalog,
            Self::Catalog => Self::Continue,
        }
    }
}

/// One continue-watching line with its next episode already resolved.
#[derive(Debug, Clone)]
pub(super) struct ContinueRow {
    pub(super) descriptor: ResumeDescriptor,
    pub(super) next_label: String,
}

pub(super) struct Dashboard {
    pub(super) view: DashboardView,
    pub(super) rows: Vec<ContinueRow>,
    pub(super) titles: Vec<Title>,
    pub(super) table_state: TableState,
    pub(super) status: String,
}

impl Dashboard {
    pub(super) fn load(services: &Services) -> Result<Self> {
        let mut dashboard = Self {
            view: DashboardView::Continue,
            rows: Vec::new(),
            titles: Vec::new(),
            table_state: TableState::default(),
            status: String::new(),
        };
        dashboard.refresh(services, None)?;
        if dashboard.rows.is_empty() && !dashboard.titles.is_empty() {
            dashboard.view = DashboardView::Catalog;
            dashboard.clamp_selection();
        }
        dashboard.status = if dashboard.titles.is_empty() {
            status_info("The catalog is empty. Point REPRISE_CATALOG at a catalog file.")
        } else {
            status_info("Ready.")
        };
        Ok(dashboard)
    }

    pub(super) fn len(&self) -> usize {
        match self.view {
            DashboardView::Continue => self.rows.len(),
            DashboardView::Catalog => self.titles.len(),
        }
    }

    fn selected_title_id(&self) -> Option<&str> {
        let idx = self.table_state.selected()?;
        match self.view {
            DashboardView::Continue => self.rows.get(idx).map(|row| row.descriptor.title_id.as_str()),
            DashboardView::Catalog => self.titles.get(idx).map(|title| title.id.as_str()),
        }
    }

    fn refresh(&mut self, services: &Services, preferred_id: Option<&str>) -> Result<()> {
        self.titles = services.catalog.titles()?;
        let progress = services.persistence.read_progress();
        let positions = services.persistence.read_positions();
        self.rows = continue_watching(services.catalog.as_ref(), &progress, &positions)
            .into_iter()
            .map(|descriptor| {
                let next_label = self
                    .titles
                    .iter()
                    .find(|title| title.id == descriptor.title_id)
                    .map(|title| describe_next(title, descriptor.next.as_ref()))
                    .unwrap_or_else(|| "-".to_string());
                ContinueRow {
                    descriptor,
                    next_label,
                }
            })
            .collect();

        if let Some(id) = preferred_id {
            let found = match self.view {
                DashboardView::Continue => self
                    .rows
                    .iter()
                    .position(|row| row.descriptor.title_id == id),
                DashboardView::Catalog => self.titles.iter().position(|title| title.id == id),
            };
            if found.is_some() {
                self.table_state.select(found);
                return Ok(());
            }
        }
        self.clamp_selection();
        Ok(())
    }

    fn clamp_selection(&mut self) {
        let len = self.len();
        if len == 0 {
            self.table_state.select(None);
            return;
        }
        let selected = self.table_state.selected().unwrap_or(0).min(len - 1);
        self.table_state.select(Some(selected));
    }

    fn move_selection(&mut self, down: bool) {
        let Some(selected) = self.table_state.selected() else {
            return;
        };
        let next = if down {
            (selected + 1).min(self.len().saturating_sub(1))
        } else {
            selected.saturating_sub(1)
        };
        self.table_state.select(Some(next));
    }

    /// Where Enter should open the selected title.
    fn initial_selection(&self, services: &Services, title_id: &str) -> InitialSelection {
        if self.view == DashboardView::Continue
            && let Some(row) = self
                .rows
                .iter()
                .find(|row| row.descriptor.title_id == title_id)
            && (row.descriptor.has_new_season || row.descriptor.has_new_episodes)
            && let Some(next) = row.descriptor.next.as_ref()
        {
            return InitialSelection::ids(Some(&next.season_id), Some(&next.episode_id));
        }
        services.stored_selection(title_id)
    }
}

pub(super) fn run_dashboard(services: &Services) -> Result<()> {
    let (mut session, mut terminal) = TuiSession::enter()?;
    let mut dashboard = Dashboard::load(services)?;

    loop {
        terminal.draw(|frame| draw_dashboard(frame, &mut dashboard))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Tab => {
                dashboard.view = dashboard.view.toggled();
                dashboard.table_state.select(Some(0));
                dashboard.clamp_selection();
            }
            KeyCode::Up => dashboard.move_selection(false),
            KeyCode::Down => dashboard.move_selection(true),
            KeyCode::Char('r') => match dashboard.refresh(services, None) {
                Ok(()) => dashboard.status = status_info("Reloaded."),
                Err(err) => dashboard.status = status_error(&format!("Reload failed: {err}")),
            },
            KeyCode::Enter => {
                let Some(title_id) = dashboard.selected_title_id().map(str::to_string) else {
                    continue;
                };
                let title = match services.require_title(&title_id) {
                    Ok(title) => title,
                    Err(err) => {
                        dashboard.status = status_error(&format!("{err:#}"));
                        continue;
                    }
                };
                let initial = dashboard.initial_selection(services, &title_id);
                let name = title.name.clone();
                run_player_screen(&mut terminal, services, title, initial)?;
                terminal.clear()?;
                dashboard.refresh(services, Some(&title_id))?;
                dashboard.status = status_info(&format!("Back from {name}."));
            }
            _ => {}
        }
    }

    session.leave(&mut terminal)?;
    Ok(())
}

/// Player screen on its own, for `reprise watch`.
pub(super) fn run_player(
    services: &Services,
    title: Title,
    initial: InitialSelection,
) -> Result<()> {
    let (mut session, mut terminal) = TuiSession::enter()?;
    let result = run_player_screen(&mut terminal, services, title, initial);
    session.leave(&mut terminal)?;
    result
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}
