use std::path::Path;
use std::process::{Command as ProcessCommand, Stdio};

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LaunchMode {
    Window,
    Fullscreen,
    MiniPlayer,
}

impl LaunchMode {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::Fullscreen => "fullscreen",
            Self::MiniPlayer => "mini player",
        }
    }
}

pub(crate) fn player_args(mode: LaunchMode, url: &str) -> Vec<String> {
    let mut args = vec!["--force-window=immediate".to_string()];
    match mode {
        LaunchMode::Window => {}
        LaunchMode::Fullscreen => args.push("--fs".to_string()),
        LaunchMode::MiniPlayer => {
            args.push("--ontop".to_string());
            args.push("--autofit=30%".to_string());
            args.push("--geometry=100%:100%".to_string());
        }
    }
    args.push(url.to_string());
    args
}

/// Start the external player in its own window and return immediately; the
/// terminal UI keeps running alongside it.
pub(crate) fn launch_player(bin: &Path, url: &str, mode: LaunchMode) -> Result<()> {
    let child = ProcessCommand::new(bin)
        .args(player_args(mode, url))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to launch {}", bin.display()))?;
    tracing::info!(pid = child.id(), mode = mode.label(), %url, "player launched");
    Ok(())
}
