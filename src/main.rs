use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod collector;
mod config;
mod error;
mod github;

use collector::Collector;
use config::{ApiSettings, Config};
use github::{GitHubClient, RateLimitPolicy};

#[derive(Parser)]
#[command(name = "ci-delivery-collector")]
#[command(about = "Collect merged pull requests and stable releases from GitHub as CSV")]
struct Cli {
    /// GitHub token (can also be set via GITHUB_TOKEN env var)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// API base URL, for GitHub Enterprise or mirrors
    #[arg(long, env = "GITHUB_API_BASE", global = true)]
    api_base: Option<String>,

    /// Config file (defaults to ./collector.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Output CSV path (overrides the config file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comma-separated owner/name list (overrides the config file)
    #[arg(short, long, value_delimiter = ',')]
    projects: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect merged pull requests
    PullRequests(Target),

    /// Collect stable releases with their release windows
    Releases(Target),

    /// Run both collectors with the configured output paths
    All {
        /// Comma-separated owner/name list (overrides the config file)
        #[arg(short, long, value_delimiter = ',')]
        projects: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so the env-backed flags and RUST_LOG see .env values.
    let env_file = config::load_env(None);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match env_file {
        Ok(Some(path)) => debug!(path = %path.display(), "Loaded environment file"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Ignoring environment file"),
    }

    let cli = Cli::parse();

    // Fail before touching the network.
    let api = ApiSettings::resolve(cli.token, cli.api_base)?;
    let mut config = config::load_config(cli.config.as_deref()).context("Failed to load config")?;

    let projects = match &cli.command {
        Commands::PullRequests(target) | Commands::Releases(target) => &target.projects,
        Commands::All { projects } => projects,
    };
    if !projects.is_empty() {
        config.projects = projects.clone();
        config::validate(&config)?;
    }

    let collector = Collector::new(build_client(&api, &config)?, config);

    match cli.command {
        Commands::PullRequests(target) => {
            let output = target
                .output
                .unwrap_or_else(|| collector.config().output.pull_requests.clone());
            collector
                .pull_requests_to(&output)
                .await
                .context("Pull request collection failed")?;
            info!(path = %output.display(), "Done");
        }
        Commands::Releases(target) => {
            let output = target
                .output
                .unwrap_or_else(|| collector.config().output.releases.clone());
            collector
                .releases_to(&output)
                .await
                .context("Release collection failed")?;
            info!(path = %output.display(), "Done");
        }
        Commands::All { .. } => {
            let output = collector.config().output.clone();
            collector.all_to(&output).await.context("Collection failed")?;
            info!("Done");
        }
    }

    Ok(())
}

fn build_client(api: &ApiSettings, config: &Config) -> Result<GitHubClient> {
    let client = GitHubClient::new(
        Some(api.token.as_str()),
        api.api_base.as_str(),
        RateLimitPolicy::from(config),
        Duration::from_secs(config.http.timeout_secs),
    )
    .context("Failed to create GitHub client")?;
    info!(api_base = client.api_base(), projects = config.projects.len(), "GitHub client ready");
    Ok(client.with_per_page(config.http.per_page))
}
