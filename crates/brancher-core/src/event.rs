//! The triggering release event and the gate it must pass before anything is
//! touched.

use crate::error::{BrancherError, Result};
use crate::version::{is_pre_release_major_version, verify_pre_release_numbering};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const RELEASE_EVENT: &str = "release";
pub const CREATED_ACTION: &str = "created";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub target_commitish: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub id: u64,
}

/// Subset of a GitHub `release` webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEvent {
    #[serde(default)]
    pub action: String,
    pub release: Release,
}

impl ReleaseEvent {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            BrancherError::Config(format!("cannot read event file '{}': {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Only the creation of a release triggers a run.
pub fn should_run(event_name: &str, action: &str) -> bool {
    event_name == RELEASE_EVENT && action == CREATED_ACTION
}

/// Reject anything but a major pre-release cut from a non-release branch.
pub fn validate_release_gate(
    tag: &str,
    target: &str,
    prerelease: bool,
    tag_prefix: &str,
) -> Result<()> {
    if !verify_pre_release_numbering(tag, tag_prefix) {
        return Err(BrancherError::Validation(format!(
            "Tag {tag} does not comply to correct versioning using prefix {tag_prefix}. \
             Workflow will not be executed."
        )));
    }
    if !is_pre_release_major_version(tag) {
        return Err(BrancherError::Validation(format!(
            "Tag {tag} is not a major version (x.0.0). Workflow will not be executed."
        )));
    }
    if !prerelease {
        return Err(BrancherError::Validation(format!(
            "Release {tag} is not a pre-release. Workflow will not be executed."
        )));
    }
    if target.contains("release") {
        return Err(BrancherError::Validation(format!(
            "The workflow is triggered on release branch {target} instead of the default \
             branch. Workflow will not be executed."
        )));
    }
    Ok(())
}
