//! Version-control collaborator backed by the system `git` binary.
//!
//! Every operation returns a typed result; stderr of a failed command is
//! carried in [`BrancherError::GitCommand`] so the caller decides whether to
//! halt or continue.

use crate::error::{BrancherError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

pub const REMOTE: &str = "origin";

#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct Git {
    workspace: PathBuf,
}

impl Git {
    /// Bind to the repository at `workspace`. Fails if `git` is not on PATH.
    pub fn open(workspace: &Path) -> Result<Self> {
        which::which("git").map_err(|_| BrancherError::GitNotFound)?;
        Ok(Self {
            workspace: workspace.to_path_buf(),
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn git_cmd(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.workspace);
        cmd.arg("-c").arg("core.quotePath=false");
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<GitOutput> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!(%command, "running git");
        let output = self.git_cmd().args(args).output()?;
        let result = GitOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !output.status.success() {
            tracing::error!(%command, stderr = %result.stderr.trim(), "git command failed");
            return Err(BrancherError::GitCommand {
                command,
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }

    pub fn fetch(&self, branch: &str) -> Result<()> {
        self.run(&["fetch", "--no-tags", REMOTE, branch])?;
        Ok(())
    }

    pub fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{branch}");
        let out = self.run(&["ls-remote", REMOTE, &refname])?;
        Ok(!out.stdout.trim().is_empty())
    }

    /// `git checkout -b <name> origin/<target>`
    pub fn create_branch(&self, name: &str, target: &str) -> Result<()> {
        let start = format!("{REMOTE}/{target}");
        self.run(&["checkout", "-b", name, &start])?;
        Ok(())
    }

    /// Files changed on `branch` since it diverged from `base`, ignoring
    /// `.github/*` and every path in `excluded`.
    pub fn diff_names(&self, branch: &str, base: &str, excluded: &[&str]) -> Result<Vec<String>> {
        let range = format!("{REMOTE}/{base}...{REMOTE}/{branch}");
        let mut pathspecs = vec![".".to_string(), ":(exclude).github/*".to_string()];
        pathspecs.extend(excluded.iter().map(|p| format!(":(exclude){p}")));

        let mut args = vec!["diff", "--name-only", range.as_str(), "--"];
        args.extend(pathspecs.iter().map(String::as_str));
        let out = self.run(&args)?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Merge `origin/<from>` into the checked-out branch.
    pub fn merge_into_current(&self, from: &str, current: &str) -> Result<()> {
        let source = format!("{REMOTE}/{from}");
        let message =
            format!("Merge branch {from} into {current} get configuration from {from}");
        self.run(&["merge", &source, "--no-ff", "--commit", "-m", &message])?;
        Ok(())
    }

    pub fn set_author(&self, email: &str, name: &str) -> Result<()> {
        self.run(&["config", "user.email", email])?;
        self.run(&["config", "user.name", name])?;
        Ok(())
    }

    /// Stage everything and commit.
    pub fn commit(&self, message: &str) -> Result<()> {
        self.run(&["add", "."])?;
        self.run(&["commit", "-m", message])?;
        Ok(())
    }

    pub fn push(&self) -> Result<()> {
        self.run(&["push", "-u", REMOTE, "HEAD"])?;
        Ok(())
    }

    pub fn current_branch(&self) -> Result<String> {
        let out = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.stdout.trim().to_string())
    }
}
