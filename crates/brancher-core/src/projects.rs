//! Release project board and the workflows that route pull requests to it.

use crate::error::Result;
use crate::github::GitHubClient;
use crate::workflow::{
    configure_archive_config, configure_assign_project_workflow, StepLocator, WorkflowFile,
};
use std::path::Path;

pub const IN_PROGRESS_COLUMN: &str = "In progress";
pub const REVIEW_IN_PROGRESS_COLUMN: &str = "Review in progress";
pub const REVIEWER_APPROVED_COLUMN: &str = "Reviewer approved";
pub const DONE_COLUMN: &str = "Done";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectBoard {
    pub project_id: u64,
    pub in_progress_column_id: u64,
    pub done_column_id: u64,
}

pub fn project_name(release_version: &str) -> String {
    format!("{release_version} Release Tracker")
}

pub fn project_description(release_version: &str) -> String {
    format!("Progress overview of pull requests targeting the release branch {release_version}")
}

/// Create the tracker project with its four columns, in board order.
pub fn create_project_board(github: &GitHubClient, release_version: &str) -> Result<ProjectBoard> {
    let project_id = github.create_project(
        &project_name(release_version),
        &project_description(release_version),
    )?;
    let in_progress_column_id = github.create_project_column(project_id, IN_PROGRESS_COLUMN)?;
    github.create_project_column(project_id, REVIEW_IN_PROGRESS_COLUMN)?;
    github.create_project_column(project_id, REVIEWER_APPROVED_COLUMN)?;
    let done_column_id = github.create_project_column(project_id, DONE_COLUMN)?;
    tracing::info!(project_id, in_progress_column_id, done_column_id, "project board created");
    Ok(ProjectBoard {
        project_id,
        in_progress_column_id,
        done_column_id,
    })
}

/// Where the board ids get written. Either path may be absent.
#[derive(Debug, Clone, Copy)]
pub struct ProjectTargets<'a> {
    pub assign_project_path: Option<&'a str>,
    pub archive_config_path: Option<&'a str>,
    pub assign_project_step: &'a StepLocator,
}

/// Create the board and wire the assign-project workflow and archive config
/// to its columns. Without any target path the board is not created.
pub fn configure_projects(
    github: &GitHubClient,
    workspace: &Path,
    release_version: &str,
    targets: &ProjectTargets<'_>,
) -> Result<Option<ProjectBoard>> {
    if targets.assign_project_path.is_none() && targets.archive_config_path.is_none() {
        tracing::info!("no project workflows configured, skipping project board");
        return Ok(None);
    }
    let board = create_project_board(github, release_version)?;

    if let Some(path) = targets.assign_project_path {
        let mut workflow = WorkflowFile::load(workspace, path)?;
        configure_assign_project_workflow(
            workflow.doc_mut(),
            release_version,
            &board.in_progress_column_id.to_string(),
            targets.assign_project_step,
        )?;
        workflow.save()?;
    }
    if let Some(path) = targets.archive_config_path {
        let mut archive = WorkflowFile::load(workspace, path)?;
        configure_archive_config(archive.doc_mut(), release_version, board.done_column_id)?;
        archive.save()?;
    }
    Ok(Some(board))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use tempfile::TempDir;

    const ASSIGN: &str = r#"name: Assign 10.0 project
on:
  pull_request:
    branches:
      - release/10.0
jobs:
  assign-project:
    runs-on: ubuntu-latest
    steps:
      - name: Assign
        id: assign-project
        uses: acme/assign-project@v1
        with:
          PROJECT_COLUMN_ID: "1"
"#;

    const ARCHIVE: &str = "projectsDoneColumns:\n  refs/heads/production/10.0: 5\n";

    fn mock_board(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
        let mut mocks = vec![server
            .mock("POST", "/repos/acme/app/projects")
            .match_body(Matcher::PartialJson(json!({
                "name": "11.0 Release Tracker",
                "body": "Progress overview of pull requests targeting the release branch 11.0",
            })))
            .with_status(201)
            .with_body(r#"{"id": 10}"#)
            .create()];
        for (name, id) in [
            (IN_PROGRESS_COLUMN, 11),
            (REVIEW_IN_PROGRESS_COLUMN, 12),
            (REVIEWER_APPROVED_COLUMN, 13),
            (DONE_COLUMN, 14),
        ] {
            mocks.push(
                server
                    .mock("POST", "/projects/10/columns")
                    .match_body(Matcher::PartialJson(json!({ "name": name })))
                    .with_status(201)
                    .with_body(format!(r#"{{"id": {id}}}"#))
                    .create(),
            );
        }
        mocks
    }

    #[test]
    fn board_reports_first_and_last_columns() {
        let mut server = mockito::Server::new();
        let mocks = mock_board(&mut server);
        let gh = GitHubClient::new(&server.url(), "acme/app", "t").unwrap();

        let board = create_project_board(&gh, "11.0").unwrap();
        assert_eq!(
            board,
            ProjectBoard {
                project_id: 10,
                in_progress_column_id: 11,
                done_column_id: 14,
            }
        );
        for mock in mocks {
            mock.assert();
        }
    }

    #[test]
    fn wires_workflows_to_board() {
        let mut server = mockito::Server::new();
        let _mocks = mock_board(&mut server);
        let gh = GitHubClient::new(&server.url(), "acme/app", "t").unwrap();

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("assign.yml"), ASSIGN).unwrap();
        std::fs::write(dir.path().join("archive.yml"), ARCHIVE).unwrap();
        let step = StepLocator::Id("assign-project".into());
        let targets = ProjectTargets {
            assign_project_path: Some("assign.yml"),
            archive_config_path: Some("archive.yml"),
            assign_project_step: &step,
        };

        let board = configure_projects(&gh, dir.path(), "11.0", &targets)
            .unwrap()
            .unwrap();
        assert_eq!(board.done_column_id, 14);

        let assign: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(dir.path().join("assign.yml")).unwrap())
                .unwrap();
        assert_eq!(assign["name"].as_str(), Some("Assign 11.0 project"));
        assert_eq!(
            assign["jobs"]["assign-project"]["steps"][0]["with"]["PROJECT_COLUMN_ID"].as_str(),
            Some("11")
        );

        let archive: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(dir.path().join("archive.yml")).unwrap())
                .unwrap();
        let columns = &archive["projectsDoneColumns"];
        assert_eq!(columns["refs/heads/production/10.0"].as_u64(), Some(5));
        assert_eq!(columns["refs/heads/production/11.0"].as_u64(), Some(14));
    }

    #[test]
    fn skipped_without_targets() {
        // No server: any request would fail.
        let gh = GitHubClient::new("http://127.0.0.1:9", "acme/app", "t").unwrap();
        let step = StepLocator::Index(0);
        let targets = ProjectTargets {
            assign_project_path: None,
            archive_config_path: None,
            assign_project_step: &step,
        };
        let dir = TempDir::new().unwrap();
        assert!(configure_projects(&gh, dir.path(), "11.0", &targets)
            .unwrap()
            .is_none());
    }
}
