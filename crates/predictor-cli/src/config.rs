//! Settings resolution for the CLI
//!
//! An explicit `--config` file wins; otherwise `~/.config/hpp/config.toml` is
//! used when present. `PREDICTOR_*` environment variables apply on top, and
//! command-line flags on top of that.

use anyhow::{Context, Result};
use predictor_lib::Settings;
use std::path::{Path, PathBuf};

/// Default per-user settings file, if a home directory is known
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("hpp").join("config.toml"))
}

fn resolve_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    }
}

pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let file = resolve_config_file(explicit);
    Settings::load(file.as_deref()).with_context(|| match &file {
        Some(path) => format!("Failed to load settings from {}", path.display()),
        None => "Failed to load settings from the environment".to_string(),
    })
}
