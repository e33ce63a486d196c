use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::Services;
use crate::app::format::episode_code;
use crate::app::launch::{LaunchMode, launch_player};
use crate::catalog::Title;
use crate::playback::{
    FocusTarget, InitialSelection, Key, KeyOutcome, KeyPress, KeyboardController,
    PlaybackMachine,
};

use super::render::draw_player;
use super::session::TuiTerminal;
use super::{POLL_INTERVAL, status_error, status_info};

const PROMPT_MAX_DIGITS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Stay,
    Quit,
}

/// Modal layer drawn over the player. Each one owns keyboard focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Overlay {
    None,
    Help,
    /// Digits typed so far.
    JumpPrompt(String),
    /// Highlighted row in the source list.
    SourcePicker(usize),
}

impl Overlay {
    fn focus(&self) -> FocusTarget {
        match self {
            Self::JumpPrompt(_) => FocusTarget::TextInput,
            Self::SourcePicker(_) => FocusTarget::Select,
            Self::None | Self::Help => FocusTarget::Page,
        }
    }
}

pub(crate) struct PlayerScreen {
    pub(crate) machine: PlaybackMachine,
    controller: KeyboardController,
    launch_request: Rc<Cell<Option<LaunchMode>>>,
    pub(super) overlay: Overlay,
    pub(super) status: String,
    played: bool,
}

impl PlayerScreen {
    fn open(services: &Services, title: Title, initial: InitialSelection) -> Self {
        let launch_request = Rc::new(Cell::new(None));
        let fullscreen = Rc::clone(&launch_request);
        let mini_player = Rc::clone(&launch_request);
        let controller = KeyboardController::new()
            .with_fullscreen(move || fullscreen.set(Some(LaunchMode::Fullscreen)))
            .with_mini_player(move || mini_player.set(Some(LaunchMode::MiniPlayer)));

        let machine = PlaybackMachine::new(
            Arc::new(title),
            initial,
            services.persistence_port(),
            Arc::clone(&services.preferences),
        );
        tracing::info!(title = %machine.title().id, "player screen opened");

        let status = if machine.current_source().is_some() {
            status_info("Enter to play, ? for shortcuts.")
        } else {
            status_info("No playable source for this selection.")
        };
        Self {
            machine,
            controller,
            launch_request,
            overlay: Overlay::None,
            status,
            played: false,
        }
    }

    pub(super) fn route(&self) -> Option<String> {
        self.machine
            .route_path(&format!("/watch/{}", self.machine.title().id))
    }

    fn handle_key(&mut self, services: &Services, key: KeyEvent) -> Flow {
        match self.overlay {
            Overlay::None => {}
            Overlay::Help => {
                self.overlay = Overlay::None;
                self.controller.set_enabled(true);
                return Flow::Stay;
            }
            Overlay::JumpPrompt(_) | Overlay::SourcePicker(_) => {
                self.handle_overlay_key(key);
                return Flow::Stay;
            }
        }

        match key.code {
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Enter => self.launch(services, LaunchMode::Window),
            KeyCode::Char('?') => {
                self.overlay = Overlay::Help;
                self.controller.set_enabled(false);
            }
            KeyCode::Char(':') if self.machine.title().has_seasons() => {
                self.overlay = Overlay::JumpPrompt(String::new());
            }
            KeyCode::Char('s') if !self.machine.current_sources().is_empty() => {
                self.overlay = Overlay::SourcePicker(self.machine.selection().source_index);
            }
            KeyCode::Char(c @ '1'..='9') => self.pick_source(c as usize - '1' as usize),
            KeyCode::Left => self.step_season(false),
            KeyCode::Right => self.step_season(true),
            KeyCode::Up => {
                self.machine.go_to_prev_episode();
            }
            KeyCode::Down => self.step_episode_in_season(),
            KeyCode::Char('l') => {
                if self.machine.go_to_last_episode() {
                    self.status = status_info("Jumped to the last episode of the season.");
                }
            }
            KeyCode::Char('r') => self.reload(services),
            _ => {
                let press = key_press(&key, self.overlay.focus());
                if self.controller.handle(&mut self.machine, &press) == KeyOutcome::Handled
                    && let Some(mode) = self.launch_request.take()
                {
                    self.launch(services, mode);
                }
            }
        }
        Flow::Stay
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        // Player shortcuts must not fire while a field or list has focus.
        let press = key_press(&key, self.overlay.focus());
        if self.controller.handle(&mut self.machine, &press) == KeyOutcome::Handled {
            return;
        }
        match (&mut self.overlay, key.code) {
            (Overlay::JumpPrompt(typed), KeyCode::Char(c)) if c.is_ascii_digit() => {
                if typed.len() < PROMPT_MAX_DIGITS {
                    typed.push(c);
                }
            }
            (Overlay::JumpPrompt(typed), KeyCode::Backspace) => {
                typed.pop();
            }
            (Overlay::JumpPrompt(typed), KeyCode::Enter) => {
                let typed = std::mem::take(typed);
                self.overlay = Overlay::None;
                self.jump_to_episode(&typed);
            }
            (Overlay::SourcePicker(cursor), KeyCode::Up) => *cursor = cursor.saturating_sub(1),
            (Overlay::SourcePicker(cursor), KeyCode::Down) => {
                let last = self.machine.current_sources().len().saturating_sub(1);
                *cursor = (*cursor + 1).min(last);
            }
            (Overlay::SourcePicker(cursor), KeyCode::Enter) => {
                let index = *cursor;
                self.overlay = Overlay::None;
                self.pick_source(index);
            }
            (_, KeyCode::Esc) => self.overlay = Overlay::None,
            _ => {}
        }
    }

    fn pick_source(&mut self, index: usize) {
        if self.machine.set_source_index(index) {
            self.status = status_info(&format!("Source {} selected.", index + 1));
        }
    }

    fn jump_to_episode(&mut self, typed: &str) {
        let Ok(number) = typed.parse::<u32>() else {
            self.status = status_error("Type an episode number.");
            return;
        };
        let target = self
            .machine
            .current_season()
            .and_then(|season| season.episode_by_number(number))
            .map(|episode| episode.id.clone());
        match target {
            Some(id) => {
                self.machine.select_episode(&id);
            }
            None => {
                self.status = status_error(&format!("No episode {number} in this season."));
            }
        }
    }

    fn step_season(&mut self, forward: bool) {
        let Some(current) = self.machine.selection().season else {
            return;
        };
        let target = if forward {
            current + 1
        } else if current > 0 {
            current - 1
        } else {
            return;
        };
        let id = self
            .machine
            .title()
            .seasons()
            .get(target)
            .map(|season| season.id.clone());
        if let Some(id) = id {
            self.machine.select_season(&id);
        }
    }

    fn step_episode_in_season(&mut self) {
        let next_id = self.machine.current_season().and_then(|season| {
            let current = self.machine.selection().episode?;
            season
                .episodes
                .get(current + 1)
                .map(|episode| episode.id.clone())
        });
        if let Some(id) = next_id {
            self.machine.select_episode(&id);
        }
    }

    fn reload(&mut self, services: &Services) {
        let id = self.machine.title().id.clone();
        match services.catalog.title(&id) {
            Ok(Some(title)) => {
                self.machine.replace_title(Arc::new(title));
                self.status = status_info("Catalog entry reloaded.");
            }
            Ok(None) => self.status = status_error("Title is no longer in the catalog."),
            Err(err) => self.status = status_error(&format!("Reload failed: {err}")),
        }
    }

    fn launch(&mut self, services: &Services, mode: LaunchMode) {
        let Some(url) = self.machine.current_source().map(str::to_string) else {
            self.status = status_error("No playable source for this selection.");
            return;
        };
        match launch_player(&services.config.player_bin, &url, mode) {
            Ok(()) => {
                self.played = true;
                let what = match (self.machine.current_season(), self.machine.current_episode()) {
                    (Some(season), Some(episode)) => {
                        episode_code(self.machine.title(), &season.id, &episode.id)
                            .unwrap_or_default()
                    }
                    _ => self.machine.title().name.clone(),
                };
                self.status = status_info(&format!("Playing {what} ({}).", mode.label()));
            }
            Err(err) => self.status = status_error(&format!("{err:#}")),
        }
    }

    fn close(&self) {
        if self.played || self.machine.title().has_seasons() {
            self.machine.on_unload();
        }
        tracing::info!(title = %self.machine.title().id, played = self.played, "player screen closed");
    }
}

/// Translate a terminal key event into the controller's key model.
pub(crate) fn key_press(event: &KeyEvent, focus: FocusTarget) -> KeyPress {
    let shift = event.modifiers.contains(KeyModifiers::SHIFT);
    let mut press = match event.code {
        KeyCode::Char(c) if shift => KeyPress::shifted(c),
        KeyCode::Char(c) => KeyPress::char(c),
        KeyCode::Esc => KeyPress {
            key: Key::Escape,
            shift,
            focus,
        },
        _ => KeyPress {
            key: Key::Other,
            shift,
            focus,
        },
    };
    press.focus = focus;
    press
}

pub(super) fn run_player_screen(
    terminal: &mut TuiTerminal,
    services: &Services,
    title: Title,
    initial: InitialSelection,
) -> Result<()> {
    with_player_screen(services, title, initial, |screen| {
        drive_player_screen(terminal, services, screen)
    })
}

/// Open a player screen, hand it to `drive`, then close it. The unload
/// beacons run even when `drive` fails.
pub(crate) fn with_player_screen<F>(
    services: &Services,
    title: Title,
    initial: InitialSelection,
    drive: F,
) -> Result<()>
where
    F: FnOnce(&mut PlayerScreen) -> Result<()>,
{
    let mut screen = PlayerScreen::open(services, title, initial);
    let result = drive(&mut screen);
    screen.close();
    result
}

fn drive_player_screen(
    terminal: &mut TuiTerminal,
    services: &Services,
    screen: &mut PlayerScreen,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw_player(frame, screen))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if screen.handle_key(services, key) == Flow::Quit {
            return Ok(());
        }
    }
}
