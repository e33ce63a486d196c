mod app;
mod catalog;
mod cli;
mod config;
mod db;
mod http;
mod logging;
mod paths;
mod playback;
mod remote;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = config::Config::from_env()?;
    logging::init(&paths::log_file_path(&config.data_dir), &config.log_filter)?;
    app::run(cli, config)
}
