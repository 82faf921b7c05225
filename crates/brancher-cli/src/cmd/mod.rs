pub mod check_tag;
pub mod config;
pub mod run;
pub mod versions;

use anyhow::Context;
use brancher_core::config::{config_path, Config};
use std::path::Path;

/// An explicit `--config` must exist; the default location falls back to
/// built-in defaults when absent.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Config::load_or_default(&config_path(root)).context("failed to load config"),
    }
}
