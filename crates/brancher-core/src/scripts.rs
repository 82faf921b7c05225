use crate::error::{BrancherError, Result};
use crate::io::{atomic_write, copy_dir_recursive, list_files};
use crate::naming::short_db_version;
use std::path::{Path, PathBuf};

pub const TEMPLATES_DIR: &str = "templates";
pub const CURRENT_DB_VERSION_TOKEN: &str = "{{CURRENT_DB_VERSION}}";
pub const NEXT_DB_VERSION_TOKEN: &str = "{{NEXT_DB_VERSION}}";
pub const NEXT_ARTIFACT_VERSION_TOKEN: &str = "{{NEXT_ARTIFACT_VERSION}}";
/// File-name marker replaced by the short database version.
pub const FILE_PREFIX_TOKEN: &str = "XX";

/// Versions substituted into every migration template.
#[derive(Debug, Clone, Copy)]
pub struct ScriptVersions<'a> {
    pub current_db: &'a str,
    pub next_db: &'a str,
    pub next_artifact: Option<&'a str>,
}

/// Replace the version tokens in `script`, quoting each value for SQL.
pub fn apply_versions(script: &str, versions: &ScriptVersions<'_>) -> String {
    let mut out = script
        .replace(CURRENT_DB_VERSION_TOKEN, &format!("'{}'", versions.current_db))
        .replace(NEXT_DB_VERSION_TOKEN, &format!("'{}'", versions.next_db));
    if let Some(artifact) = versions.next_artifact {
        out = out.replace(NEXT_ARTIFACT_VERSION_TOKEN, &format!("'{artifact}'"));
    }
    out
}

pub fn apply_versions_into_file(path: &Path, versions: &ScriptVersions<'_>) -> Result<()> {
    tracing::debug!(path = %path.display(), "stamping script");
    let data = std::fs::read_to_string(path)?;
    atomic_write(path, apply_versions(&data, versions).as_bytes())
}

/// Target name for a stamped file: the prefix token in the file name (never in
/// parent directories) becomes the short database version.
pub fn stamped_file_name(path: &Path, next_db: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    if !name.contains(FILE_PREFIX_TOKEN) {
        return None;
    }
    let renamed = name.replacen(FILE_PREFIX_TOKEN, &short_db_version(next_db), 1);
    Some(path.with_file_name(renamed))
}

/// Copy `<scripts>/templates` to `<scripts>/<next_db>`, stamp every file and
/// rename it. Returns the final paths of the stamped files.
pub fn configure_scripts(
    versions: &ScriptVersions<'_>,
    workspace: &Path,
    scripts_path: &str,
) -> Result<Vec<PathBuf>> {
    let base = workspace.join(scripts_path);
    let from = base.join(TEMPLATES_DIR);
    let to = base.join(versions.next_db);
    if !from.is_dir() {
        return Err(BrancherError::Config(format!(
            "script templates folder '{}' does not exist",
            from.display()
        )));
    }
    copy_dir_recursive(&from, &to)?;

    let mut stamped = Vec::new();
    for file in list_files(&to)? {
        apply_versions_into_file(&file, versions)?;
        let target = match stamped_file_name(&file, versions.next_db) {
            Some(target) => {
                std::fs::rename(&file, &target)?;
                target
            }
            None => file,
        };
        stamped.push(target);
    }
    tracing::info!(
        folder = %to.display(),
        files = stamped.len(),
        "scripts added for next version"
    );
    Ok(stamped)
}
