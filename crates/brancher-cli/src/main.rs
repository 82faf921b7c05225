mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{check_tag::CheckTagArgs, config::ConfigSubcommand, run::RunArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "release-brancher",
    about = "Cut a release branch from a major pre-release and open the next version",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from .git/)
    #[arg(long, global = true, env = "BRANCHER_ROOT")]
    root: Option<PathBuf>,

    /// Config file (default: <root>/.github/release-brancher.yaml)
    #[arg(long, global = true, env = "BRANCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle the triggering release event
    Run(RunArgs),

    /// Show the versions recorded in the settings file
    Versions {
        /// Settings key of the working branch
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Check a tag against the release gate without touching anything
    CheckTag(CheckTagArgs),

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run(args) => cmd::run::run(&root, config, args, cli.json),
        Commands::Versions { branch } => cmd::versions::run(&root, config, &branch, cli.json),
        Commands::CheckTag(args) => cmd::check_tag::run(&root, config, args, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
