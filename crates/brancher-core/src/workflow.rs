//! Patching of CI workflow definitions and the project archive config.
//!
//! Steps are addressed through a [`StepLocator`]: an identifier matched against
//! a step's `id` or `name`, or a positional index for templates without ids.
//! Any missing job, step, key or array slot is a
//! [`BrancherError::MalformedWorkflow`].

use crate::error::{BrancherError, Result};
use crate::io::atomic_write;
use crate::naming::{
    assign_project_workflow_name, production_ref, release_branch, sync_workflow_name,
};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SYNC_JOB: &str = "sync-branches";
pub const ASSIGN_PROJECT_JOB: &str = "assign-project";
pub const DONE_COLUMNS_KEY: &str = "projectsDoneColumns";

// ---------------------------------------------------------------------------
// StepLocator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepLocator {
    /// Zero-based position in the job's `steps` list.
    Index(usize),
    /// Value of the step's `id` or `name` field.
    Id(String),
}

impl fmt::Display for StepLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepLocator::Index(i) => write!(f, "steps[{i}]"),
            StepLocator::Id(id) => write!(f, "step '{id}'"),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowFile
// ---------------------------------------------------------------------------

/// A YAML document loaded from the workspace, patched in memory, written back.
#[derive(Debug)]
pub struct WorkflowFile {
    path: PathBuf,
    doc: Value,
}

impl WorkflowFile {
    pub fn load(workspace: &Path, relative: &str) -> Result<Self> {
        let path = workspace.join(relative);
        tracing::info!(path = %path.display(), "loading workflow");
        let data = std::fs::read_to_string(&path)?;
        let doc: Value = serde_yaml::from_str(&data)?;
        Ok(Self { path, doc })
    }

    pub fn doc(&self) -> &Value {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Value {
        &mut self.doc
    }

    pub fn save(&self) -> Result<()> {
        let data = serde_yaml::to_string(&self.doc)?;
        atomic_write(&self.path, data.as_bytes())?;
        tracing::info!(path = %self.path.display(), "workflow changed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Navigation helpers
// ---------------------------------------------------------------------------

fn missing(what: impl Into<String>) -> BrancherError {
    BrancherError::MalformedWorkflow(what.into())
}

fn mapping_mut<'a>(value: &'a mut Value, key: &str, ctx: &str) -> Result<&'a mut Mapping> {
    value
        .get_mut(key)
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| missing(format!("missing mapping '{ctx}{key}'")))
}

fn set_string(map: &mut Mapping, key: &str, value: &str) {
    map.insert(Value::from(key), Value::from(value));
}

/// Replace the first branch of `on.<trigger>.branches`.
fn set_trigger_branch(doc: &mut Value, trigger: &str, branch: &str) -> Result<()> {
    let on = mapping_mut(doc, "on", "")?;
    let branches = on
        .get_mut(trigger)
        .and_then(|t| t.get_mut("branches"))
        .and_then(Value::as_sequence_mut)
        .ok_or_else(|| missing(format!("missing sequence 'on.{trigger}.branches'")))?;
    let first = branches
        .first_mut()
        .ok_or_else(|| missing(format!("'on.{trigger}.branches' is empty")))?;
    *first = Value::from(branch);
    Ok(())
}

fn step_matches(step: &Value, id: &str) -> bool {
    ["id", "name"]
        .iter()
        .any(|field| step.get(*field).and_then(Value::as_str) == Some(id))
}

/// The `with:` mapping of the located step in `jobs.<job>.steps`.
fn step_inputs_mut<'a>(
    doc: &'a mut Value,
    job: &str,
    locator: &StepLocator,
) -> Result<&'a mut Mapping> {
    let steps = doc
        .get_mut("jobs")
        .and_then(|jobs| jobs.get_mut(job))
        .and_then(|j| j.get_mut("steps"))
        .and_then(Value::as_sequence_mut)
        .ok_or_else(|| missing(format!("missing sequence 'jobs.{job}.steps'")))?;
    let step = match locator {
        StepLocator::Index(i) => steps.get_mut(*i),
        StepLocator::Id(id) => steps.iter_mut().find(|s| step_matches(s, id)),
    }
    .ok_or_else(|| missing(format!("{locator} not found in job '{job}'")))?;
    step.get_mut("with")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| missing(format!("{locator} of job '{job}' has no 'with' mapping")))
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Point the sync workflow at the new release branch, syncing into `target_branch`.
pub fn configure_sync_workflow(
    doc: &mut Value,
    version: &str,
    target_branch: &str,
    locator: &StepLocator,
) -> Result<()> {
    let branch = release_branch(version);
    let inputs = step_inputs_mut(doc, SYNC_JOB, locator)?;
    set_string(inputs, "SOURCE_BRANCH", &branch);
    set_string(inputs, "TARGET_BRANCH", target_branch);
    set_trigger_branch(doc, "push", &branch)?;
    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| missing("top level is not a mapping"))?;
    set_string(root, "name", &sync_workflow_name(version));
    Ok(())
}

/// On the previous release branch, only retarget the sync at the new release.
pub fn configure_sync_workflow_for_previous_release(
    doc: &mut Value,
    version: &str,
    locator: &StepLocator,
) -> Result<()> {
    let inputs = step_inputs_mut(doc, SYNC_JOB, locator)?;
    set_string(inputs, "TARGET_BRANCH", &release_branch(version));
    Ok(())
}

pub fn configure_assign_project_workflow(
    doc: &mut Value,
    version: &str,
    column_id: &str,
    locator: &StepLocator,
) -> Result<()> {
    let inputs = step_inputs_mut(doc, ASSIGN_PROJECT_JOB, locator)?;
    set_string(inputs, "PROJECT_COLUMN_ID", column_id);
    set_trigger_branch(doc, "pull_request", &release_branch(version))?;
    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| missing("top level is not a mapping"))?;
    set_string(root, "name", &assign_project_workflow_name(version));
    Ok(())
}

/// Map `refs/heads/production/<version>` to the board's done column.
/// Existing entries are kept; an entry for the same ref is overwritten.
pub fn configure_archive_config(
    doc: &mut Value,
    version: &str,
    done_column_id: u64,
) -> Result<()> {
    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| missing("top level is not a mapping"))?;
    let columns = root
        .entry(Value::from(DONE_COLUMNS_KEY))
        .or_insert_with(|| Value::Mapping(Mapping::new()))
        .as_mapping_mut()
        .ok_or_else(|| missing(format!("'{DONE_COLUMNS_KEY}' is not a mapping")))?;
    columns.insert(
        Value::from(production_ref(version)),
        Value::from(done_column_id),
    );
    Ok(())
}
