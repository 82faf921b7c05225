use crate::error::{BrancherError, Result};
use crate::workflow::StepLocator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".github/release-brancher.yaml";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// GitIdentity
// ---------------------------------------------------------------------------

/// Author used for every automation commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitIdentity {
    #[serde(default = "default_git_email")]
    pub email: String,
    #[serde(default = "default_git_name")]
    pub name: String,
}

fn default_git_email() -> String {
    "github-actions[bot]@users.noreply.github.com".to_string()
}

fn default_git_name() -> String {
    "github-actions[bot]".to_string()
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            email: default_git_email(),
            name: default_git_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// StepsConfig
// ---------------------------------------------------------------------------

/// Which step of each workflow job gets patched. A string matches the step's
/// `id` or `name`; an integer selects by position.
///
/// Templates whose steps carry no `id` need a zero-based index, e.g.
/// `steps: { sync: 2 }` for the third step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepsConfig {
    #[serde(default = "default_sync_step")]
    pub sync: StepLocator,
    #[serde(default = "default_assign_project_step")]
    pub assign_project: StepLocator,
}

fn default_sync_step() -> StepLocator {
    StepLocator::Id("sync".to_string())
}

fn default_assign_project_step() -> StepLocator {
    StepLocator::Id("assign-project".to_string())
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            sync: default_sync_step(),
            assign_project: default_assign_project_step(),
        }
    }
}

// ---------------------------------------------------------------------------
// JiraConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraProject {
    pub id: u64,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    pub sub_domain: String,
    /// Replaces `https://<sub_domain>.atlassian.net` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub email: String,
    #[serde(default)]
    pub projects: Vec<JiraProject>,
    pub master_project_id: u64,
    pub master_project_key: String,
    pub master_issue_type: String,
    /// Extra `customfield_*` values copied verbatim into the master ticket.
    #[serde(default)]
    pub master_ticket_fields: Map<String, Value>,
    /// Custom field that receives `{ "id": <master version id> }`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_version_field: Option<String>,
    pub confluence_space_key: String,
    pub ancestor_page: u64,
    pub content_path: String,
}

impl JiraConfig {
    pub fn site_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => crate::jira::site_url(&self.sub_domain),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_settings_path: Option<String>,
    #[serde(default = "default_version_prefix")]
    pub version_prefix: String,
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,
    #[serde(default)]
    pub git: GitIdentity,
    #[serde(default = "default_workflow_path")]
    pub workflow_path: String,
    #[serde(default = "default_version_path")]
    pub version_path: String,
    #[serde(default = "default_scripts_path")]
    pub scripts_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_project_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_config_path: Option<String>,
    #[serde(default = "default_codeowners_path")]
    pub codeowners_path: String,
    #[serde(default)]
    pub steps: StepsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira: Option<JiraConfig>,
}

fn default_settings_path() -> String {
    "settings.json".to_string()
}

fn default_version_prefix() -> String {
    "v.".to_string()
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

fn default_workflow_path() -> String {
    ".github/workflows/sync-branches.yml".to_string()
}

fn default_version_path() -> String {
    "version.txt".to_string()
}

fn default_scripts_path() -> String {
    "scripts".to_string()
}

fn default_codeowners_path() -> String {
    ".github/CODEOWNERS".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            app_settings_path: None,
            version_prefix: default_version_prefix(),
            tag_prefix: default_tag_prefix(),
            git: GitIdentity::default(),
            workflow_path: default_workflow_path(),
            version_path: default_version_path(),
            scripts_path: default_scripts_path(),
            assign_project_path: None,
            archive_config_path: None,
            codeowners_path: default_codeowners_path(),
            steps: StepsConfig::default(),
            jira: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BrancherError::Config(format!(
                "config file '{}' not found",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        for (field, value) in [
            ("settings_path", &self.settings_path),
            ("workflow_path", &self.workflow_path),
            ("version_path", &self.version_path),
            ("scripts_path", &self.scripts_path),
            ("codeowners_path", &self.codeowners_path),
        ] {
            if value.trim().is_empty() {
                push(WarnLevel::Error, format!("{field} must not be empty"));
            }
        }

        if self.version_prefix.is_empty() {
            push(
                WarnLevel::Warning,
                "version_prefix is empty; versions will be bare numbers".to_string(),
            );
        }
        if self.tag_prefix.is_empty() {
            push(
                WarnLevel::Warning,
                "tag_prefix is empty; every numeric tag will be accepted".to_string(),
            );
        }

        for (field, locator) in [
            ("steps.sync", &self.steps.sync),
            ("steps.assign_project", &self.steps.assign_project),
        ] {
            if let StepLocator::Id(id) = locator {
                if id.trim().is_empty() {
                    push(WarnLevel::Error, format!("{field} must name a step"));
                }
            }
        }

        if self.assign_project_path.is_some() != self.archive_config_path.is_some() {
            push(
                WarnLevel::Warning,
                "assign_project_path and archive_config_path are usually set together"
                    .to_string(),
            );
        }

        match &self.jira {
            None => push(
                WarnLevel::Warning,
                "no jira section; issue tracker and wiki steps are skipped".to_string(),
            ),
            Some(jira) => {
                if jira.sub_domain.trim().is_empty() && jira.base_url.is_none() {
                    push(
                        WarnLevel::Error,
                        "jira.sub_domain must be set when jira.base_url is absent".to_string(),
                    );
                }
                if jira.email.trim().is_empty() {
                    push(WarnLevel::Error, "jira.email must not be empty".to_string());
                }
                if jira.content_path.trim().is_empty() {
                    push(
                        WarnLevel::Error,
                        "jira.content_path must not be empty".to_string(),
                    );
                }
                if jira.projects.is_empty() {
                    push(
                        WarnLevel::Warning,
                        "jira.projects is empty; only the master project gets a version"
                            .to_string(),
                    );
                }
                for key in jira.master_ticket_fields.keys() {
                    if !key.starts_with("customfield_") {
                        push(
                            WarnLevel::Warning,
                            format!("jira.master_ticket_fields key '{key}' is not a custom field"),
                        );
                    }
                }
            }
        }

        warnings
    }
}
