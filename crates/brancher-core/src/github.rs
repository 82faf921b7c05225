//! Source-forge collaborator: pull requests and release project boards.

use crate::error::{BrancherError, Result};
use crate::http::{build_client, send_json};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Serialize)]
struct NewPullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
}

#[derive(Debug, Serialize)]
struct MergeRequest<'a> {
    commit_title: &'a str,
    commit_message: &'a str,
    merge_method: &'a str,
}

#[derive(Debug, Deserialize)]
struct MergeResult {
    merged: bool,
}

#[derive(Debug, Serialize)]
struct NewProject<'a> {
    name: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct NewColumn<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u64,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubClient {
    /// `repository` is `owner/name`, as in `GITHUB_REPOSITORY`.
    pub fn new(api_url: &str, repository: &str, token: &str) -> Result<Self> {
        let (owner, repo) = repository.split_once('/').ok_or_else(|| {
            BrancherError::Config(format!("repository '{repository}' is not 'owner/name'"))
        })?;
        Ok(Self {
            http: build_client()?,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn repo_path(&self, rest: &str) -> String {
        format!("/repos/{}/{}{rest}", self.owner, self.repo)
    }

    /// Open a pull request from `head` into `base`; returns its number.
    pub fn open_pull_request(&self, title: &str, body: &str, head: &str, base: &str) -> Result<u64> {
        let payload = NewPullRequest {
            title,
            body,
            head,
            base,
            draft: false,
        };
        let request = self.request(Method::POST, &self.repo_path("/pulls")).json(&payload);
        let pr: PullRequest = send_json("open pull request", request)?;
        tracing::info!(number = pr.number, head, base, "pull request opened");
        Ok(pr.number)
    }

    /// Merge with a merge commit; returns the API's `merged` flag.
    pub fn merge_pull_request(&self, number: u64, title: &str, message: &str) -> Result<bool> {
        let payload = MergeRequest {
            commit_title: title,
            commit_message: message,
            merge_method: "merge",
        };
        let path = self.repo_path(&format!("/pulls/{number}/merge"));
        let request = self.request(Method::PUT, &path).json(&payload);
        let result: MergeResult = send_json("merge pull request", request)?;
        Ok(result.merged)
    }

    pub fn create_project(&self, name: &str, body: &str) -> Result<u64> {
        let request = self
            .request(Method::POST, &self.repo_path("/projects"))
            .json(&NewProject { name, body });
        let created: Created = send_json("create project", request)?;
        Ok(created.id)
    }

    pub fn create_project_column(&self, project_id: u64, name: &str) -> Result<u64> {
        let request = self
            .request(Method::POST, &format!("/projects/{project_id}/columns"))
            .json(&NewColumn { name });
        let created: Created = send_json("create project column", request)?;
        Ok(created.id)
    }
}
