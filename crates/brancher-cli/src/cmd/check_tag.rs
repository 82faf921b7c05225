use crate::cmd::load_config;
use crate::output::print_json;
use brancher_core::event::validate_release_gate;
use brancher_core::naming::{
    next_configuration_branch, previous_configuration_branch, release_branch,
};
use brancher_core::version::{next_version, previous_version, version_from_tag};
use clap::Args;
use serde::Serialize;
use std::path::Path;

#[derive(Args)]
pub struct CheckTagArgs {
    /// Release tag, e.g. v11.0.0-rc
    pub tag: String,

    /// Branch the release would be cut from
    #[arg(long, default_value = "main")]
    pub target: String,

    /// Whether the release is marked as a pre-release
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub prerelease: bool,
}

#[derive(Serialize)]
struct Plan {
    release_version: String,
    release_branch: String,
    previous_release_branch: String,
    previous_configuration_branch: String,
    next_version: String,
    next_configuration_branch: String,
}

pub fn run(
    root: &Path,
    config: Option<&Path>,
    args: CheckTagArgs,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root, config)?;
    validate_release_gate(&args.tag, &args.target, args.prerelease, &config.tag_prefix)?;

    let version = version_from_tag(&config.tag_prefix, &args.tag);
    let previous = previous_version(&version)?;
    let next = next_version(&version)?;
    let plan = Plan {
        release_branch: release_branch(&version),
        previous_release_branch: release_branch(&previous),
        previous_configuration_branch: previous_configuration_branch(&previous),
        next_configuration_branch: next_configuration_branch(&next),
        release_version: version,
        next_version: next,
    };

    if json {
        return print_json(&plan);
    }
    println!("Tag {} accepted.", args.tag);
    println!("  release branch:          {}", plan.release_branch);
    println!("  previous release branch: {}", plan.previous_release_branch);
    println!("  previous configuration:  {}", plan.previous_configuration_branch);
    println!("  next configuration:      {}", plan.next_configuration_branch);
    Ok(())
}
