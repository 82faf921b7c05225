use crate::error::{BrancherError, Result};
use crate::io::atomic_write;
use regex::Regex;
use std::path::Path;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Strip `prefix` from `tag` and keep `<major>.<minor>`.
///
/// `version_from_tag("v", "v11.0.0-rc")` → `11.0`. Components are not checked
/// for being numeric; run [`verify_pre_release_numbering`] first.
pub fn version_from_tag(prefix: &str, tag: &str) -> String {
    let stripped = tag.strip_prefix(prefix).unwrap_or(tag);
    stripped.split('.').take(2).collect::<Vec<_>>().join(".")
}

/// Last `/` segment of `branch` when it contains `branch_type`.
///
/// `version_from_branch("release/11.0", "release")` → `11.0`; any other branch
/// name is returned unchanged.
pub fn version_from_branch(branch: &str, branch_type: &str) -> String {
    if branch.contains(branch_type) {
        if let Some((_, last)) = branch.rsplit_once('/') {
            return last.to_string();
        }
    }
    branch.to_string()
}

/// Leading integer of a version string (digits up to the first non-digit).
pub fn major_of(version: &str) -> Result<u32> {
    let digits: String = version.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse()
        .map_err(|_| BrancherError::InvalidVersionFormat(version.to_string()))
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

pub fn previous_version(version: &str) -> Result<String> {
    let major = major_of(version)?;
    let previous = major
        .checked_sub(1)
        .ok_or_else(|| BrancherError::InvalidVersionFormat(version.to_string()))?;
    Ok(format!("{previous}.0"))
}

pub fn next_version(version: &str) -> Result<String> {
    let major = major_of(version)?;
    Ok(format!("{}.0", major + 1))
}

/// Release number used for run outputs: `11.0` → `11`.
pub fn release_number(version: &str) -> String {
    version.replacen(".0", "", 1)
}

// ---------------------------------------------------------------------------
// Pre-release gating
// ---------------------------------------------------------------------------

/// True when `tag` is exactly `<prefix>MM.mm.pppp-label` with a lowercase label.
pub fn verify_pre_release_numbering(tag: &str, prefix: &str) -> bool {
    let pattern = format!(
        r"^{}\d{{1,2}}\.\d{{1,2}}\.\d{{1,4}}-[a-z]+$",
        regex::escape(prefix)
    );
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(tag),
        Err(_) => false,
    }
}

pub fn is_pre_release_major_version(tag: &str) -> bool {
    tag.contains(".0.0")
}

// ---------------------------------------------------------------------------
// Version file
// ---------------------------------------------------------------------------

/// Overwrite the plaintext version file with `version`.
pub fn apply_next_version(version: &str, workspace: &Path, version_path: &str) -> Result<()> {
    let path = workspace.join(version_path);
    atomic_write(&path, version.as_bytes())?;
    tracing::info!(path = %path.display(), version, "version file updated");
    Ok(())
}
