//! Naming conventions shared by every component.
//!
//! Artifact versions are `<prefix><major>0` (`v.110`), database versions are
//! `<prefix>0.0<major>` (`v.0.011`). Release branches are `release/<major>.0`.

/// `format_artifact_version("v.", 12)` → `v.120`
pub fn format_artifact_version(prefix: &str, major: u32) -> String {
    format!("{prefix}{major}0")
}

/// `format_database_version("v.", 12)` → `v.0.012`
pub fn format_database_version(prefix: &str, major: u32) -> String {
    format!("{prefix}0.0{major}")
}

/// Database version with the `.0.` segment removed: `v.0.011` → `v011`.
pub fn short_db_version(db_version: &str) -> String {
    db_version.replace(".0.", "")
}

pub fn release_branch(version: &str) -> String {
    format!("release/{version}")
}

/// Path segment that replaces the branch key in a snapshot's artifact source.
pub fn release_source_segment(major: u32) -> String {
    format!("release_{major}.0")
}

pub fn production_ref(version: &str) -> String {
    format!("refs/heads/production/{version}")
}

pub fn previous_configuration_branch(previous_version: &str) -> String {
    format!("automation/configure-previous-version-{previous_version}")
}

pub fn next_configuration_branch(next_version: &str) -> String {
    format!("automation/configure-next-version-{next_version}")
}

pub fn sync_workflow_name(version: &str) -> String {
    format!("Sync {version} upwards")
}

pub fn assign_project_workflow_name(version: &str) -> String {
    format!("Assign {version} project")
}
