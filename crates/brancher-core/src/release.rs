//! End-to-end handling of a major pre-release: gate, cut the release branch,
//! reconfigure the previous and next versions, then update the tracker.

use crate::config::Config;
use crate::error::{BrancherError, Result};
use crate::event::{validate_release_gate, Release};
use crate::git::Git;
use crate::github::GitHubClient;
use crate::jira::JiraClient;
use crate::naming::{next_configuration_branch, previous_configuration_branch, release_branch};
use crate::projects::{configure_projects, ProjectTargets};
use crate::scripts::{configure_scripts, ScriptVersions};
use crate::settings::{
    configure_app_settings, configure_settings, load_code_owners, versions_from_settings,
    write_code_owners,
};
use crate::tracker::Tracker;
use crate::version::{
    apply_next_version, next_version, previous_version, release_number, version_from_tag,
};
use crate::workflow::{
    configure_sync_workflow, configure_sync_workflow_for_previous_release, WorkflowFile,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run outputs: release numbers without the minor part (`11`, `12`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub current_release: String,
    pub next_release: String,
}

/// Collaborators for one run. The tracker client is optional; without it the
/// issue-tracker and wiki steps are skipped.
pub struct ReleaseContext<'a> {
    pub config: &'a Config,
    pub git: &'a Git,
    pub github: &'a GitHubClient,
    pub jira: Option<&'a JiraClient>,
}

impl ReleaseContext<'_> {
    fn workspace(&self) -> &Path {
        self.git.workspace()
    }

    pub fn on_release_created(&self, release: &Release) -> Result<ReleaseInfo> {
        let tag = release.tag_name.as_str();
        let target = release.target_commitish.as_str();
        tracing::info!(
            tag,
            target,
            prerelease = release.prerelease,
            id = release.id,
            "release created"
        );
        validate_release_gate(tag, target, release.prerelease, &self.config.tag_prefix)?;

        let release_version = version_from_tag(&self.config.tag_prefix, tag);
        let release_branch_name = release_branch(&release_version);
        let previous = previous_version(&release_version)?;
        let previous_branch = release_branch(&previous);
        tracing::info!(
            version = %release_version,
            branch = %release_branch_name,
            previous = %previous,
            previous_branch = %previous_branch,
            "release resolved"
        );

        self.fetch(target);
        self.fetch(&previous_branch);
        self.check_preconditions(&release_branch_name, &previous_branch, target)?;

        self.git
            .set_author(&self.config.git.email, &self.config.git.name)?;
        tracing::info!("author identity added");

        self.configure_previous_version(&release_version, &previous, &previous_branch)?;
        self.create_new_major_version(
            &release_version,
            &release_branch_name,
            &previous_branch,
            target,
        )?;
        let next = self.configure_next_version(&release_version, &release_branch_name, target)?;
        self.update_tracker(&release_version)?;

        Ok(ReleaseInfo {
            current_release: release_number(&release_version),
            next_release: release_number(&next),
        })
    }

    /// Fetch failures are logged and the run continues.
    fn fetch(&self, branch: &str) {
        if let Err(e) = self.git.fetch(branch) {
            tracing::error!(branch, error = %e, "fetch failed, continuing");
        }
    }

    fn check_preconditions(
        &self,
        release_branch_name: &str,
        previous_branch: &str,
        target: &str,
    ) -> Result<()> {
        let exists = self.git.remote_branch_exists(release_branch_name)?;
        let changed = self
            .git
            .diff_names(previous_branch, target, &[self.config.settings_path.as_str()])?;
        if exists {
            tracing::error!(branch = release_branch_name, "release branch already exists");
        }
        if !changed.is_empty() {
            tracing::error!(
                branch = previous_branch,
                target,
                files = ?changed,
                "there are conflicts between the previous release branch and the target; \
                 resolve them and create a new release"
            );
        }
        if exists || !changed.is_empty() {
            return Err(BrancherError::Validation(format!(
                "Cannot proceed with the creation of the release branch {release_branch_name}."
            )));
        }
        Ok(())
    }

    /// Retarget the previous release's sync workflow at the new release branch.
    fn configure_previous_version(
        &self,
        release_version: &str,
        previous: &str,
        previous_branch: &str,
    ) -> Result<()> {
        tracing::info!("start configuration of previous version");
        self.fetch(previous_branch);
        let branch = previous_configuration_branch(previous);
        self.git.create_branch(&branch, previous_branch)?;

        let mut workflow = WorkflowFile::load(self.workspace(), &self.config.workflow_path)?;
        configure_sync_workflow_for_previous_release(
            workflow.doc_mut(),
            release_version,
            &self.config.steps.sync,
        )?;
        workflow.save()?;

        self.git
            .commit(&format!("configure new version {release_version} on {previous}"))?;
        self.git.push()?;
        let title = format!("Configure new version {release_version} on {previous}");
        self.open_and_merge(&title, &branch, previous_branch)?;
        tracing::info!("previous version configured");
        Ok(())
    }

    fn create_new_major_version(
        &self,
        release_version: &str,
        release_branch_name: &str,
        previous_branch: &str,
        target: &str,
    ) -> Result<()> {
        tracing::info!("start creation of new major version");
        let cfg = self.config;
        let ws = self.workspace();
        self.fetch(previous_branch);
        self.fetch(target);

        // Owners come from the previous-version branch still checked out.
        let owners = load_code_owners(ws, &cfg.codeowners_path)?;
        self.git.create_branch(release_branch_name, target)?;
        self.merge_keeping_code_owners(previous_branch, release_branch_name, owners)?;

        configure_settings(
            release_version,
            ws,
            &cfg.settings_path,
            &cfg.version_prefix,
            target,
        )?;
        if let Some(app_settings) = &cfg.app_settings_path {
            let versions = versions_from_settings(ws, &cfg.settings_path, target)?;
            configure_app_settings(
                &versions.previous_artifact_version,
                &versions.current_artifact_version,
                ws,
                app_settings,
            )?;
        }

        let mut workflow = WorkflowFile::load(ws, &cfg.workflow_path)?;
        configure_sync_workflow(workflow.doc_mut(), release_version, target, &cfg.steps.sync)?;
        workflow.save()?;

        let targets = ProjectTargets {
            assign_project_path: cfg.assign_project_path.as_deref(),
            archive_config_path: cfg.archive_config_path.as_deref(),
            assign_project_step: &cfg.steps.assign_project,
        };
        configure_projects(self.github, ws, release_version, &targets)?;

        self.git
            .commit(&format!("setup new version {release_version}"))?;
        self.git.push()?;
        tracing::info!(branch = release_branch_name, "new major version created");
        Ok(())
    }

    /// Bring the release branch back into the target and open the next
    /// version there. Returns the next version.
    fn configure_next_version(
        &self,
        release_version: &str,
        release_branch_name: &str,
        target: &str,
    ) -> Result<String> {
        tracing::info!("start configuration of next version");
        let cfg = self.config;
        let ws = self.workspace();
        self.fetch(release_branch_name);
        self.fetch(target);

        let next = next_version(release_version)?;
        let branch = next_configuration_branch(&next);
        self.git.create_branch(&branch, target)?;
        let owners = load_code_owners(ws, &cfg.codeowners_path)?;
        self.merge_keeping_code_owners(release_branch_name, &branch, owners)?;

        let versions = versions_from_settings(ws, &cfg.settings_path, target)?;
        apply_next_version(&versions.next_artifact_version, ws, &cfg.version_path)?;
        configure_scripts(
            &ScriptVersions {
                current_db: &versions.current_db_version,
                next_db: &versions.next_db_version,
                next_artifact: Some(&versions.next_artifact_version),
            },
            ws,
            &cfg.scripts_path,
        )?;
        tracing::info!(next_db = %versions.next_db_version, "scripts added for next version");

        self.git
            .commit(&format!("configure next version {next} on {target}"))?;
        self.git.push()?;
        let title = format!("Configure next version {next} on {target}");
        self.open_and_merge(&title, &branch, target)?;
        tracing::info!(target, "next version configured");
        Ok(next)
    }

    /// Merge `from` into the checked-out branch, then write `owners` back as
    /// its CODEOWNERS.
    fn merge_keeping_code_owners(
        &self,
        from: &str,
        current: &str,
        owners: Option<String>,
    ) -> Result<()> {
        self.git.merge_into_current(from, current)?;
        write_code_owners(self.workspace(), &self.config.codeowners_path, owners.as_deref())?;
        tracing::info!(from, into = current, "branch merged");
        Ok(())
    }

    fn open_and_merge(&self, title: &str, head: &str, base: &str) -> Result<()> {
        let number = self.github.open_pull_request(title, title, head, base)?;
        let message = format!("Merge pull request #{number} from {head}");
        if self.github.merge_pull_request(number, &message, &message)? {
            tracing::info!(number, base, "pull request merged");
        } else {
            tracing::error!(number, base, "pull request not merged");
        }
        Ok(())
    }

    fn update_tracker(&self, release_version: &str) -> Result<()> {
        let (Some(jira_config), Some(client)) = (&self.config.jira, self.jira) else {
            tracing::info!("issue tracker not configured, skipping");
            return Ok(());
        };
        let tracker = Tracker::new(client, jira_config);
        tracker.configure_jira(release_version, &self.config.tag_prefix)?;
        tracker.setup_confluence(self.workspace(), release_version)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::*;
    use mockito::Matcher;
    use serde_json::json;

    const SETTINGS: &str = r#"{
	"main": {
		"artifact": {
			"version": "v.110",
			"source": "myArtifact/main/artifact.zip"
		},
		"database": {
			"version": "v.0.011"
		}
	},
	"release": [
		{
			"artifact": {
				"version": "v.090",
				"source": "myArtifact/release_9.0/artifact.zip"
			},
			"database": {
				"version": "v.0.09"
			}
		},
		{
			"artifact": {
				"version": "v.100",
				"source": "myArtifact/release_10.0/artifact.zip"
			},
			"database": {
				"version": "v.0.010"
			}
		}
	]
}"#;

    const SYNC: &str = r#"name: Sync 10.0 upwards
on:
  push:
    branches:
      - release/10.0
jobs:
  sync-branches:
    runs-on: ubuntu-latest
    steps:
      - name: Sync branches
        id: sync
        uses: acme/sync-branches@v1
        with:
          SOURCE_BRANCH: release/10.0
          TARGET_BRANCH: main
"#;

    const SCRIPT: &str = "UPDATE version SET v = {{NEXT_DB_VERSION}} WHERE v = {{CURRENT_DB_VERSION}};\n";

    fn release(tag: &str, target: &str) -> Release {
        Release {
            tag_name: tag.to_string(),
            target_commitish: target.to_string(),
            prerelease: true,
            id: 1,
        }
    }

    fn show(origin: &Path, spec: &str) -> String {
        sh(origin, &["show", spec])
    }

    fn mock_pull_requests(server: &mut mockito::ServerGuard, merged: bool) -> Vec<mockito::Mock> {
        let mut mocks = Vec::new();
        for (number, head, base) in [
            (1, "automation/configure-previous-version-10.0", "release/10.0"),
            (2, "automation/configure-next-version-12.0", "main"),
        ] {
            mocks.push(
                server
                    .mock("POST", "/repos/acme/app/pulls")
                    .match_body(Matcher::PartialJson(json!({"head": head, "base": base})))
                    .with_status(201)
                    .with_body(format!(r#"{{"number": {number}}}"#))
                    .create(),
            );
            mocks.push(
                server
                    .mock("PUT", format!("/repos/acme/app/pulls/{number}/merge").as_str())
                    .match_body(Matcher::PartialJson(json!({
                        "commit_title": format!("Merge pull request #{number} from {head}"),
                    })))
                    .with_status(200)
                    .with_body(format!(r#"{{"merged": {merged}}}"#))
                    .create(),
            );
        }
        mocks
    }

    #[test]
    fn gate_failure_touches_nothing() {
        if !git_available() {
            return;
        }
        let sb = sandbox(&[("README.md", "hello\n")]);
        let git = Git::open(&sb.work).unwrap();
        let github = GitHubClient::new("http://127.0.0.1:9", "acme/app", "t").unwrap();
        let config = Config::default();
        let ctx = ReleaseContext {
            config: &config,
            git: &git,
            github: &github,
            jira: None,
        };
        let err = ctx
            .on_release_created(&release("v11.1.0-rc", "main"))
            .unwrap_err();
        assert!(matches!(err, BrancherError::Validation(_)));
        assert_eq!(git.current_branch().unwrap(), "main");
    }

    #[test]
    fn existing_release_branch_halts() {
        if !git_available() {
            return;
        }
        let sb = sandbox(&[("README.md", "hello\n")]);
        push_branch(&sb.work, "release/10.0", &[]);
        sh(&sb.work, &["checkout", "-q", "main"]);
        push_branch(&sb.work, "release/11.0", &[]);
        let git = Git::open(&sb.work).unwrap();
        let github = GitHubClient::new("http://127.0.0.1:9", "acme/app", "t").unwrap();
        let config = Config::default();
        let ctx = ReleaseContext {
            config: &config,
            git: &git,
            github: &github,
            jira: None,
        };
        let err = ctx
            .on_release_created(&release("v11.0.0-rc", "main"))
            .unwrap_err();
        assert!(
            matches!(err, BrancherError::Validation(ref m) if m.contains("release/11.0")),
            "{err}"
        );
    }

    #[test]
    fn cuts_release_and_configures_neighbours() {
        if !git_available() {
            return;
        }
        let sb = sandbox(&[
            ("settings.json", SETTINGS),
            (".github/workflows/sync-branches.yml", SYNC),
            (".github/CODEOWNERS", "* @acme/main-owners\n"),
            ("version.txt", "v.110"),
            ("scripts/templates/XX_update.sql", SCRIPT),
        ]);
        push_branch(
            &sb.work,
            "release/10.0",
            &[(".github/CODEOWNERS", "* @acme/release-owners\n")],
        );

        let mut server = mockito::Server::new();
        let mocks = mock_pull_requests(&mut server, true);
        let git = Git::open(&sb.work).unwrap();
        let github = GitHubClient::new(&server.url(), "acme/app", "t").unwrap();
        let config = Config::default();
        let ctx = ReleaseContext {
            config: &config,
            git: &git,
            github: &github,
            jira: None,
        };

        let info = ctx
            .on_release_created(&release("v11.0.0-rc", "main"))
            .unwrap();
        assert_eq!(
            info,
            ReleaseInfo {
                current_release: "11".into(),
                next_release: "12".into(),
            }
        );
        for mock in mocks {
            mock.assert();
        }

        // Previous release now syncs into the new release branch.
        let previous_sync: serde_yaml::Value = serde_yaml::from_str(&show(
            &sb.origin,
            "automation/configure-previous-version-10.0:.github/workflows/sync-branches.yml",
        ))
        .unwrap();
        let with = &previous_sync["jobs"]["sync-branches"]["steps"][0]["with"];
        assert_eq!(with["TARGET_BRANCH"].as_str(), Some("release/11.0"));
        assert_eq!(with["SOURCE_BRANCH"].as_str(), Some("release/10.0"));

        // Release branch: settings advanced, sync workflow renamed, release owners kept.
        let settings: serde_json::Value =
            serde_json::from_str(&show(&sb.origin, "release/11.0:settings.json")).unwrap();
        assert_eq!(settings["main"]["artifact"]["version"], "v.120");
        assert_eq!(settings["main"]["database"]["version"], "v.0.012");
        let snapshots = settings["release"].as_array().unwrap();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[2]["artifact"]["version"], "v.110");
        assert_eq!(
            snapshots[2]["artifact"]["source"],
            "myArtifact/release_11.0/artifact.zip"
        );
        let sync: serde_yaml::Value = serde_yaml::from_str(&show(
            &sb.origin,
            "release/11.0:.github/workflows/sync-branches.yml",
        ))
        .unwrap();
        assert_eq!(sync["name"].as_str(), Some("Sync 11.0 upwards"));
        assert_eq!(
            sync["jobs"]["sync-branches"]["steps"][0]["with"]["SOURCE_BRANCH"].as_str(),
            Some("release/11.0")
        );
        assert_eq!(
            show(&sb.origin, "release/11.0:.github/CODEOWNERS"),
            "* @acme/release-owners\n"
        );

        // Next version branch: version file and stamped scripts.
        let next = "automation/configure-next-version-12.0";
        assert_eq!(show(&sb.origin, &format!("{next}:version.txt")), "v.120");
        let script = show(&sb.origin, &format!("{next}:scripts/v.0.012/v012_update.sql"));
        assert_eq!(
            script,
            "UPDATE version SET v = 'v.0.012' WHERE v = 'v.0.011';\n"
        );
        assert_eq!(
            show(&sb.origin, &format!("{next}:.github/CODEOWNERS")),
            "* @acme/main-owners\n"
        );
    }

    fn standard_sandbox() -> Sandbox {
        let sb = sandbox(&[
            ("settings.json", SETTINGS),
            (".github/workflows/sync-branches.yml", SYNC),
            ("version.txt", "v.110"),
            ("scripts/templates/XX_update.sql", SCRIPT),
        ]);
        push_branch(&sb.work, "release/10.0", &[]);
        sh(&sb.work, &["checkout", "-q", "main"]);
        sb
    }

    #[test]
    fn unmerged_previous_release_changes_halt() {
        if !git_available() {
            return;
        }
        let sb = sandbox(&[("README.md", "hello\n")]);
        push_branch(
            &sb.work,
            "release/10.0",
            &[("src/hotfix.sql", "UPDATE t SET x = 1;\n")],
        );
        sh(&sb.work, &["checkout", "-q", "main"]);
        let git = Git::open(&sb.work).unwrap();
        let github = GitHubClient::new("http://127.0.0.1:9", "acme/app", "t").unwrap();
        let config = Config::default();
        let ctx = ReleaseContext {
            config: &config,
            git: &git,
            github: &github,
            jira: None,
        };
        let err = ctx
            .on_release_created(&release("v11.0.0-rc", "main"))
            .unwrap_err();
        assert!(
            matches!(err, BrancherError::Validation(ref m) if m.contains("release/11.0")),
            "{err}"
        );
        assert_eq!(git.current_branch().unwrap(), "main");
        assert!(!git.remote_branch_exists("release/11.0").unwrap());
    }

    #[test]
    fn unmerged_pull_requests_do_not_stop_the_run() {
        if !git_available() {
            return;
        }
        let sb = standard_sandbox();
        let mut server = mockito::Server::new();
        let mocks = mock_pull_requests(&mut server, false);
        let git = Git::open(&sb.work).unwrap();
        let github = GitHubClient::new(&server.url(), "acme/app", "t").unwrap();
        let config = Config::default();
        let ctx = ReleaseContext {
            config: &config,
            git: &git,
            github: &github,
            jira: None,
        };

        let info = ctx
            .on_release_created(&release("v11.0.0-rc", "main"))
            .unwrap();
        assert_eq!(info.current_release, "11");
        assert_eq!(info.next_release, "12");
        for mock in mocks {
            mock.assert();
        }
        assert!(git.remote_branch_exists("release/11.0").unwrap());
    }

    #[test]
    fn failed_fetch_is_not_fatal() {
        if !git_available() {
            return;
        }
        let sb = standard_sandbox();
        let git = Git::open(&sb.work).unwrap();
        let github = GitHubClient::new("http://127.0.0.1:9", "acme/app", "t").unwrap();
        let config = Config::default();
        let ctx = ReleaseContext {
            config: &config,
            git: &git,
            github: &github,
            jira: None,
        };

        assert!(git.fetch("release/9.0").is_err());
        ctx.fetch("release/9.0");
        ctx.check_preconditions("release/11.0", "release/10.0", "main").unwrap();
        assert_eq!(git.current_branch().unwrap(), "main");
    }
}
