use crate::cmd::load_config;
use crate::output::{print_json, print_table};
use anyhow::Context;
use brancher_core::settings::versions_from_settings;
use std::path::Path;

pub fn run(root: &Path, config: Option<&Path>, branch: &str, json: bool) -> anyhow::Result<()> {
    let config = load_config(root, config)?;
    let versions = versions_from_settings(root, &config.settings_path, branch)
        .with_context(|| format!("failed to read versions from {}", config.settings_path))?;

    if json {
        return print_json(&versions);
    }
    let rows = [
        ("current database", &versions.current_db_version),
        ("next database", &versions.next_db_version),
        ("previous artifact", &versions.previous_artifact_version),
        ("current artifact", &versions.current_artifact_version),
        ("next artifact", &versions.next_artifact_version),
    ]
    .into_iter()
    .map(|(name, value)| vec![name.to_string(), value.clone()])
    .collect::<Vec<_>>();
    print_table(&["VERSION", "VALUE"], &rows);
    Ok(())
}
