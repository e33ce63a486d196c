//! Player keyboard shortcuts.

use super::machine::PlaybackMachine;
use super::ports::DisplayMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Other,
}

/// What currently has input focus on the host screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusTarget {
    #[default]
    Page,
    /// Any text entry field, single or multi line.
    TextInput,
    Select,
}

impl FocusTarget {
    fn accepts_typing(self) -> bool {
        matches!(self, Self::TextInput | Self::Select)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
    pub focus: FocusTarget,
}

impl KeyPress {
    pub fn char(c: char) -> Self {
        Self {
            key: Key::Char(c),
            shift: false,
            focus: FocusTarget::Page,
        }
    }

    pub fn shifted(c: char) -> Self {
        Self {
            shift: true,
            ..Self::char(c)
        }
    }
}

/// `Handled` means the host must suppress the key's default behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Handled,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub keys: &'static str,
    pub description: &'static str,
}

pub const SHORTCUTS: &[Shortcut] = &[
    Shortcut {
        keys: "N",
        description: "Next episode",
    },
    Shortcut {
        keys: "P",
        description: "Previous episode",
    },
    Shortcut {
        keys: "Shift+N",
        description: "Next season",
    },
    Shortcut {
        keys: "A",
        description: "Toggle autoplay",
    },
    Shortcut {
        keys: "T",
        description: "Cinema mode",
    },
    Shortcut {
        keys: "F",
        description: "Fullscreen",
    },
    Shortcut {
        keys: "I",
        description: "Mini player",
    },
    Shortcut {
        keys: "Esc",
        description: "Exit cinema mode",
    },
];

type HostAction = Box<dyn FnMut()>;

pub struct KeyboardController {
    enabled: bool,
    on_fullscreen: Option<HostAction>,
    on_mini_player: Option<HostAction>,
}

impl std::fmt::Debug for KeyboardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardController")
            .field("enabled", &self.enabled)
            .field("on_fullscreen", &self.on_fullscreen.is_some())
            .field("on_mini_player", &self.on_mini_player.is_some())
            .finish()
    }
}

impl Default for KeyboardController {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardController {
    pub fn new() -> Self {
        Self {
            enabled: true,
            on_fullscreen: None,
            on_mini_player: None,
        }
    }

    pub fn with_fullscreen(mut self, action: impl FnMut() + 'static) -> Self {
        self.on_fullscreen = Some(Box::new(action));
        self
    }

    pub fn with_mini_player(mut self, action: impl FnMut() + 'static) -> Self {
        self.on_mini_player = Some(Box::new(action));
        self
    }

    /// Disabled while the host shows a modal; every key is then ignored.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn handle(&mut self, machine: &mut PlaybackMachine, press: &KeyPress) -> KeyOutcome {
        if !self.enabled || press.focus.accepts_typing() {
            return KeyOutcome::Ignored;
        }

        let episodic = machine.title().has_seasons();
        let handled = match press.key {
            Key::Escape => {
                if machine.preferences().display_mode == DisplayMode::Cinema {
                    machine.set_display_mode(DisplayMode::Default);
                    true
                } else {
                    false
                }
            }
            Key::Char(c) => match (c.to_ascii_lowercase(), press.shift) {
                ('n', true) => episodic && machine.go_to_next_season(),
                ('n', false) => episodic && machine.has_next_episode() && machine.go_to_next_episode(),
                ('p', _) => episodic && machine.has_prev_episode() && machine.go_to_prev_episode(),
                ('a', _) => {
                    machine.toggle_autoplay();
                    true
                }
                ('t', _) => {
                    machine.toggle_display_mode();
                    true
                }
                ('f', _) => run_host_action(self.on_fullscreen.as_mut()),
                ('i', _) => run_host_action(self.on_mini_player.as_mut()),
                _ => false,
            },
            Key::Other => false,
        };

        if handled {
            KeyOutcome::Handled
        } else {
            KeyOutcome::Ignored
        }
    }
}

fn run_host_action(action: Option<&mut HostAction>) -> bool {
    match action {
        Some(action) => {
            action();
            true
        }
        None => false,
    }
}
