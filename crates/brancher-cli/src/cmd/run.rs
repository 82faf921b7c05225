use crate::cmd::load_config;
use crate::output::print_json;
use anyhow::Context;
use brancher_core::event::{should_run, Release, ReleaseEvent};
use brancher_core::git::Git;
use brancher_core::github::{GitHubClient, DEFAULT_API_URL};
use brancher_core::jira::JiraClient;
use brancher_core::release::{ReleaseContext, ReleaseInfo};
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct RunArgs {
    /// Release tag; bypasses the event payload (requires --target)
    #[arg(long, requires = "target")]
    pub tag: Option<String>,

    /// Branch the release was cut from
    #[arg(long, requires = "tag")]
    pub target: Option<String>,

    /// Mark the --tag release as a pre-release
    #[arg(long)]
    pub prerelease: bool,

    #[arg(long, env = "GITHUB_EVENT_NAME")]
    pub event_name: Option<String>,

    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    /// Repository as owner/name
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    #[arg(long, env = "GITHUB_SHA")]
    pub sha: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true)]
    pub jira_token: Option<String>,

    /// File receiving `current-release` / `next-release` outputs
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub output_file: Option<PathBuf>,
}

pub fn run(root: &Path, config: Option<&Path>, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let Some(release) = resolve_release(&args)? else {
        return Ok(());
    };
    let config = load_config(root, config)?;
    tracing::info!(revision = ?args.sha, "handling release");

    let repository = args
        .repository
        .as_deref()
        .context("repository is required (--repository or GITHUB_REPOSITORY)")?;
    let token = args
        .github_token
        .as_deref()
        .context("GitHub token is required (--github-token or GITHUB_TOKEN)")?;
    let github = GitHubClient::new(&args.github_api_url, repository, token)?;
    let jira = match (&config.jira, args.jira_token.as_deref()) {
        (Some(jira), Some(token)) => Some(JiraClient::new(&jira.site_url(), &jira.email, token)?),
        (Some(_), None) => {
            anyhow::bail!("a jira section is configured but JIRA_TOKEN is not set")
        }
        (None, _) => None,
    };
    let git = Git::open(root)?;

    let ctx = ReleaseContext {
        config: &config,
        git: &git,
        github: &github,
        jira: jira.as_ref(),
    };
    let info = ctx
        .on_release_created(&release)
        .with_context(|| format!("release {} failed", release.tag_name))?;

    if let Some(path) = &args.output_file {
        write_outputs(path, &info)?;
    }
    if json {
        print_json(&info)?;
    } else {
        println!(
            "Release {} created; next release is {}.",
            info.current_release, info.next_release
        );
    }
    Ok(())
}

/// The release to handle, or `None` when the event is not a release creation.
fn resolve_release(args: &RunArgs) -> anyhow::Result<Option<Release>> {
    if let (Some(tag), Some(target)) = (&args.tag, &args.target) {
        return Ok(Some(Release {
            tag_name: tag.clone(),
            target_commitish: target.clone(),
            prerelease: args.prerelease,
            id: 0,
        }));
    }

    let event_name = args
        .event_name
        .as_deref()
        .context("no event: pass --tag/--target or set GITHUB_EVENT_NAME")?;
    let event_path = args
        .event_path
        .as_deref()
        .context("GITHUB_EVENT_PATH is required to read the event payload")?;
    let event = ReleaseEvent::load(event_path)?;
    tracing::info!(event = event_name, action = %event.action, "received event");
    if !should_run(event_name, &event.action) {
        tracing::info!("not a release creation, nothing to do");
        return Ok(None);
    }
    Ok(Some(event.release))
}

/// Append `key=value` lines in the GitHub Actions output-file format.
fn write_outputs(path: &Path, info: &ReleaseInfo) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open output file {}", path.display()))?;
    writeln!(file, "current-release={}", info.current_release)?;
    writeln!(file, "next-release={}", info.next_release)?;
    Ok(())
}
