use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "reprise",
    version,
    about = "Watch films and series with per-title resume progress"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Continue-watching dashboard (default)
    Tui,
    /// Open the player screen for one title
    Watch {
        title_id: String,
        /// Season number (1-based, as shown in the catalog)
        #[arg(long, conflicts_with = "route")]
        season: Option<u32>,
        /// Episode number within the season
        #[arg(long, requires = "season", conflicts_with = "route")]
        episode: Option<u32>,
        /// Path such as `/watch/show/saison-2/episode-3`
        #[arg(long)]
        route: Option<String>,
    },
    /// Print the continue-watching list
    Resume,
    /// List catalog titles
    Catalog,
    /// Print player keyboard shortcuts
    Keys,
}
