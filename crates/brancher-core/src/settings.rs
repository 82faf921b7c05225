//! Settings document: per-branch artifact/database versions plus the ordered
//! `release` history of frozen snapshots.
//!
//! Documents are kept as ordered JSON maps so unknown keys and key order
//! survive a read-transform-write cycle. Typed accessors fail with
//! [`BrancherError::SettingsFormat`] naming the missing field.

use crate::error::{BrancherError, Result};
use crate::io::{atomic_write, copy_dir_recursive};
use crate::naming::{format_artifact_version, format_database_version, release_source_segment};
use crate::version::major_of;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

const RELEASE_KEY: &str = "release";

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn section<'a>(
    map: &'a Map<String, Value>,
    name: &str,
    ctx: &str,
) -> Result<&'a Map<String, Value>> {
    map.get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| BrancherError::SettingsFormat(format!("missing object '{ctx}.{name}'")))
}

fn section_mut<'a>(
    map: &'a mut Map<String, Value>,
    name: &str,
    ctx: &str,
) -> Result<&'a mut Map<String, Value>> {
    map.get_mut(name)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| BrancherError::SettingsFormat(format!("missing object '{ctx}.{name}'")))
}

fn string_field<'a>(map: &'a Map<String, Value>, name: &str, ctx: &str) -> Result<&'a str> {
    map.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| BrancherError::SettingsFormat(format!("missing string '{ctx}.{name}'")))
}

// ---------------------------------------------------------------------------
// BranchSettings
// ---------------------------------------------------------------------------

/// Live settings of a working branch. Mutable.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSettings {
    key: String,
    fields: Map<String, Value>,
}

impl BranchSettings {
    fn from_value(key: &str, value: &Value) -> Result<Self> {
        let fields = value
            .as_object()
            .ok_or_else(|| BrancherError::SettingsFormat(format!("'{key}' is not an object")))?
            .clone();
        let settings = Self {
            key: key.to_string(),
            fields,
        };
        // Fail early on a branch that lacks the fields every operation needs.
        settings.artifact_version()?;
        settings.artifact_source()?;
        settings.database_version()?;
        Ok(settings)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn artifact_version(&self) -> Result<&str> {
        let artifact = section(&self.fields, "artifact", &self.key)?;
        string_field(artifact, "version", &format!("{}.artifact", self.key))
    }

    pub fn artifact_source(&self) -> Result<&str> {
        let artifact = section(&self.fields, "artifact", &self.key)?;
        string_field(artifact, "source", &format!("{}.artifact", self.key))
    }

    pub fn database_version(&self) -> Result<&str> {
        let database = section(&self.fields, "database", &self.key)?;
        string_field(database, "version", &format!("{}.database", self.key))
    }

    pub fn set_artifact_version(&mut self, version: String) -> Result<()> {
        let key = self.key.clone();
        section_mut(&mut self.fields, "artifact", &key)?
            .insert("version".into(), Value::String(version));
        Ok(())
    }

    pub fn set_database_version(&mut self, version: String) -> Result<()> {
        let key = self.key.clone();
        section_mut(&mut self.fields, "database", &key)?
            .insert("version".into(), Value::String(version));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ReleaseSnapshot
// ---------------------------------------------------------------------------

/// Frozen copy of a branch's settings taken when a release branch is cut.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSnapshot {
    fields: Map<String, Value>,
}

impl ReleaseSnapshot {
    /// Structural copy of `branch` with every occurrence of the branch key in
    /// `artifact.source` replaced by `release_<major>.0`.
    pub fn capture(branch: &BranchSettings, major: u32) -> Result<Self> {
        let source = branch
            .artifact_source()?
            .replace(branch.key(), &release_source_segment(major));
        let mut fields = branch.fields.clone();
        section_mut(&mut fields, "artifact", branch.key())?
            .insert("source".into(), Value::String(source));
        Ok(Self { fields })
    }

    fn from_value(index: usize, value: &Value) -> Result<Self> {
        let fields = value
            .as_object()
            .ok_or_else(|| {
                BrancherError::SettingsFormat(format!("release[{index}] is not an object"))
            })?
            .clone();
        Ok(Self { fields })
    }

    pub fn artifact_version(&self) -> Result<&str> {
        let artifact = section(&self.fields, "artifact", "release[]")?;
        string_field(artifact, "version", "release[].artifact")
    }

    pub fn artifact_source(&self) -> Result<&str> {
        let artifact = section(&self.fields, "artifact", "release[]")?;
        string_field(artifact, "source", "release[].artifact")
    }

    pub fn database_version(&self) -> Result<&str> {
        let database = section(&self.fields, "database", "release[]")?;
        string_field(database, "version", "release[].database")
    }
}

// ---------------------------------------------------------------------------
// SettingsDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    root: Map<String, Value>,
}

impl SettingsDocument {
    pub fn parse(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(BrancherError::SettingsFormat(
                "top level is not an object".to_string(),
            )),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    /// Pretty JSON with tab indentation, keys in their original order.
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.root.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| BrancherError::SettingsFormat(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write(path, self.to_json_string()?.as_bytes())
    }

    pub fn branch(&self, key: &str) -> Result<BranchSettings> {
        let value = self
            .root
            .get(key)
            .ok_or_else(|| BrancherError::SettingsFormat(format!("missing branch '{key}'")))?;
        BranchSettings::from_value(key, value)
    }

    pub fn set_branch(&mut self, settings: BranchSettings) {
        self.root
            .insert(settings.key.clone(), Value::Object(settings.fields));
    }

    fn release_list(&self) -> Result<&Vec<Value>> {
        self.root
            .get(RELEASE_KEY)
            .and_then(Value::as_array)
            .ok_or_else(|| BrancherError::SettingsFormat(format!("missing array '{RELEASE_KEY}'")))
    }

    pub fn releases(&self) -> Result<Vec<ReleaseSnapshot>> {
        self.release_list()?
            .iter()
            .enumerate()
            .map(|(i, v)| ReleaseSnapshot::from_value(i, v))
            .collect()
    }

    pub fn push_release(&mut self, snapshot: ReleaseSnapshot) -> Result<()> {
        self.root
            .get_mut(RELEASE_KEY)
            .and_then(Value::as_array_mut)
            .ok_or_else(|| BrancherError::SettingsFormat(format!("missing array '{RELEASE_KEY}'")))?
            .push(Value::Object(snapshot.fields));
        Ok(())
    }

    /// Snapshot at `len - 1 - back`, if the history is long enough.
    fn release_from_end(&self, back: usize) -> Result<ReleaseSnapshot> {
        let list = self.release_list()?;
        let required = back + 1;
        if list.len() < required {
            return Err(BrancherError::InsufficientHistory {
                required,
                found: list.len(),
            });
        }
        let index = list.len() - required;
        ReleaseSnapshot::from_value(index, &list[index])
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Freeze the current settings of `branch_key` into `release[]`, then move the
/// branch to the next major version.
pub fn advance_settings(
    release_version: &str,
    doc: &mut SettingsDocument,
    branch_key: &str,
    version_prefix: &str,
) -> Result<()> {
    let major = major_of(release_version)?;
    let mut branch = doc.branch(branch_key)?;
    // Validate the history list before mutating anything.
    doc.release_list()?;

    let snapshot = ReleaseSnapshot::capture(&branch, major)?;
    doc.push_release(snapshot)?;

    let next_major = major + 1;
    let next_artifact = format_artifact_version(version_prefix, next_major);
    let next_db = format_database_version(version_prefix, next_major);
    tracing::info!(branch = branch_key, %next_artifact, %next_db, "advancing branch settings");
    branch.set_artifact_version(next_artifact)?;
    branch.set_database_version(next_db)?;
    doc.set_branch(branch);
    Ok(())
}

/// Load, advance and write back the settings file.
pub fn configure_settings(
    release_version: &str,
    workspace: &Path,
    settings_path: &str,
    version_prefix: &str,
    branch_key: &str,
) -> Result<()> {
    let path = workspace.join(settings_path);
    tracing::info!(path = %path.display(), "configuring settings");
    let mut doc = SettingsDocument::load(&path)?;
    advance_settings(release_version, &mut doc, branch_key, version_prefix)?;
    doc.save(&path)?;
    tracing::info!("settings changed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Version lookup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsVersions {
    pub current_db_version: String,
    pub next_db_version: String,
    pub current_artifact_version: String,
    pub next_artifact_version: String,
    pub previous_artifact_version: String,
}

pub fn read_versions(doc: &SettingsDocument, branch_key: &str) -> Result<SettingsVersions> {
    let branch = doc.branch(branch_key)?;
    let current = doc.release_from_end(0)?;
    let previous = doc.release_from_end(1)?;
    Ok(SettingsVersions {
        current_db_version: current.database_version()?.to_string(),
        next_db_version: branch.database_version()?.to_string(),
        current_artifact_version: current.artifact_version()?.to_string(),
        next_artifact_version: branch.artifact_version()?.to_string(),
        previous_artifact_version: previous.artifact_version()?.to_string(),
    })
}

pub fn versions_from_settings(
    workspace: &Path,
    settings_path: &str,
    branch_key: &str,
) -> Result<SettingsVersions> {
    let doc = SettingsDocument::load(&workspace.join(settings_path))?;
    read_versions(&doc, branch_key)
}

// ---------------------------------------------------------------------------
// App settings and CODEOWNERS
// ---------------------------------------------------------------------------

/// Seed `<app_settings>/<current>` from `<app_settings>/<previous>`.
pub fn configure_app_settings(
    previous_artifact_version: &str,
    current_artifact_version: &str,
    workspace: &Path,
    app_settings_path: &str,
) -> Result<()> {
    let base = workspace.join(app_settings_path);
    let from = base.join(previous_artifact_version);
    let to = base.join(current_artifact_version);
    if !from.is_dir() {
        return Err(BrancherError::SettingsFormat(format!(
            "app settings folder '{}' does not exist",
            from.display()
        )));
    }
    copy_dir_recursive(&from, &to)?;
    tracing::info!(from = %from.display(), to = %to.display(), "app settings copied");
    Ok(())
}

/// Read CODEOWNERS so it can be restored after a merge. `None` if absent.
pub fn load_code_owners(workspace: &Path, codeowners_path: &str) -> Result<Option<String>> {
    let path = workspace.join(codeowners_path);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(std::fs::read_to_string(path)?))
}

pub fn write_code_owners(
    workspace: &Path,
    codeowners_path: &str,
    content: Option<&str>,
) -> Result<()> {
    if let Some(content) = content {
        atomic_write(&workspace.join(codeowners_path), content.as_bytes())?;
    }
    Ok(())
}
