use std::io;

use anyhow::{Context, Result};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

pub(super) type TuiTerminal = Terminal<CrosstermBackend<io::Stdout>>;

/// Raw mode plus alternate screen, restored on drop even when a screen
/// returns early with an error.
pub(super) struct TuiSession {
    active: bool,
}

impl TuiSession {
    pub(super) fn enter() -> Result<(Self, TuiTerminal)> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let session = Self { active: true };
        execute!(io::stdout(), EnterAlternateScreen).context("failed to enter alternate screen")?;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
            .context("failed to initialize terminal backend")?;
        terminal.clear()?;
        Ok((session, terminal))
    }

    pub(super) fn leave(&mut self, terminal: &mut TuiTerminal) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        terminal.show_cursor()?;
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(io::stdout(), LeaveAlternateScreen).context("failed to leave alternate screen")?;
        self.active = false;
        Ok(())
    }
}

impl Drop for TuiSession {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}
