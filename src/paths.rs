use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("reprise"))
}

pub fn database_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("reprise.db")
}

pub fn catalog_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("catalog.json")
}

pub fn log_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("reprise.log")
}
