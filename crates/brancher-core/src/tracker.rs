//! Issue-tracker bookkeeping for a new major release: fix versions in every
//! project, the master ticket, and the release content page.

use crate::config::JiraConfig;
use crate::content::adapt_content_file;
use crate::error::{BrancherError, Result};
use crate::jira::{
    paragraph_document, AncestorRef, ConfluencePage, CreatedPage, IdRef, IssueFields, JiraClient,
    JiraVersion, NewIssue, PageBody, SpaceRef, Storage,
};
use serde_json::{Map, Value};
use std::path::Path;

pub const MASTER_TICKET_DESCRIPTION: &str = "Not released yet.";

/// `<tag_prefix><release_version>.0`, e.g. `v11.0.0`.
pub fn major_version_name(tag_prefix: &str, release_version: &str) -> String {
    format!("{tag_prefix}{release_version}.0")
}

pub fn master_ticket_query(project_key: &str, fix_version: &str) -> String {
    format!("project = {project_key} AND fixVersion in ({fix_version})")
}

pub fn content_page_title(release_version: &str) -> String {
    format!("Release content of major version {release_version}")
}

pub struct Tracker<'a> {
    client: &'a JiraClient,
    config: &'a JiraConfig,
}

impl<'a> Tracker<'a> {
    pub fn new(client: &'a JiraClient, config: &'a JiraConfig) -> Self {
        Self { client, config }
    }

    /// Create the major version everywhere and make sure a master ticket exists.
    pub fn configure_jira(&self, release_version: &str, tag_prefix: &str) -> Result<()> {
        let major = major_version_name(tag_prefix, release_version);
        for project in &self.config.projects {
            self.create_if_not_exists_version(&major, project.id, &project.key)?;
        }
        let master_version = self.create_if_not_exists_version(
            &major,
            self.config.master_project_id,
            &self.config.master_project_key,
        )?;
        match master_version.id.as_deref() {
            Some(version_id) => {
                tracing::info!(version = %major, version_id, "master ticket version ready");
                self.create_master_ticket(&major, version_id)?;
            }
            None => tracing::warn!(version = %major, "master version has no id, skipping ticket"),
        }
        Ok(())
    }

    pub fn create_if_not_exists_version(
        &self,
        fix_version: &str,
        project_id: u64,
        project_key: &str,
    ) -> Result<JiraVersion> {
        let existing = self
            .client
            .list_project_versions(project_key)?
            .into_iter()
            .find(|v| v.name == fix_version);
        if let Some(version) = existing {
            tracing::info!(project = project_key, id = ?version.id, "version found");
            return Ok(version);
        }
        tracing::info!(project = project_key, version = fix_version, "version not found, creating");
        let created = self
            .client
            .create_version(&JiraVersion::unreleased(fix_version, project_id))?;
        tracing::info!(project = project_key, id = ?created.id, "version created");
        Ok(created)
    }

    /// Key of the master ticket for `fix_version`, if exactly one matches.
    pub fn master_ticket_key(&self, fix_version: &str) -> Result<Option<String>> {
        let query = master_ticket_query(&self.config.master_project_key, fix_version);
        tracing::info!(%query, "searching master ticket");
        let mut issues = self.client.search_issues(&query, &["summary"])?;
        let key = if issues.len() == 1 {
            issues.pop().map(|i| i.key)
        } else {
            None
        };
        tracing::info!(key = ?key, "master ticket lookup");
        Ok(key)
    }

    pub fn master_ticket(&self, version: &str, version_id: &str) -> NewIssue {
        let mut custom: Map<String, Value> = self.config.master_ticket_fields.clone();
        if let Some(field) = &self.config.master_version_field {
            custom.insert(field.clone(), serde_json::json!({ "id": version_id }));
        }
        NewIssue {
            update: Map::new(),
            fields: IssueFields {
                summary: format!("{version} Master Ticket"),
                issuetype: IdRef::new(&self.config.master_issue_type),
                project: IdRef::new(self.config.master_project_id.to_string()),
                description: paragraph_document(MASTER_TICKET_DESCRIPTION),
                fix_versions: vec![IdRef::new(version_id)],
                custom,
            },
        }
    }

    /// Create the master ticket unless a unique one already carries `version`.
    pub fn create_master_ticket(&self, version: &str, version_id: &str) -> Result<Option<String>> {
        if self.master_ticket_key(version)?.is_some() {
            return Ok(None);
        }
        let created = self.client.create_issue(&self.master_ticket(version, version_id))?;
        tracing::info!(key = %created.key, "master ticket created");
        Ok(Some(created.key))
    }

    /// Publish the content page under the configured ancestor. Returns the
    /// page's web URL.
    pub fn create_release_content_page(&self, release_version: &str, content: &str) -> Result<String> {
        let page = ConfluencePage {
            title: content_page_title(release_version),
            kind: "page".to_string(),
            space: SpaceRef {
                key: self.config.confluence_space_key.clone(),
            },
            ancestors: vec![AncestorRef {
                id: self.config.ancestor_page,
            }],
            body: PageBody {
                storage: Storage {
                    representation: "storage".to_string(),
                    value: content.to_string(),
                },
            },
        };
        let created: CreatedPage = self.client.create_confluence_page(&page)?;
        let url = format!("{}/wiki{}", self.config.site_url(), created.links.webui);
        tracing::info!(%url, "created confluence page");
        Ok(url)
    }

    /// Template the configured content file and publish it.
    pub fn setup_confluence(&self, workspace: &Path, release_version: &str) -> Result<String> {
        if self.config.content_path.trim().is_empty() {
            return Err(BrancherError::Config("jira.content_path is empty".to_string()));
        }
        let content = adapt_content_file(workspace, &self.config.content_path, release_version)?;
        self.create_release_content_page(release_version, &content)
    }
}
