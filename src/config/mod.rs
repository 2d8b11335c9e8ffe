mod types;

pub use types::{Config, OutputConfig};

use crate::error::{CollectorError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "collector.toml";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Load `KEY=value` pairs from a dotenv file into the process environment.
///
/// Variables already set in the environment win over the file. Without
/// `path`, `.env` is searched for from the working directory upwards.
/// A missing file is not an error. Returns the file that was loaded.
pub fn load_env(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(CollectorError::Config(format!("invalid .env file: {}", e))),
    }
}

/// Load the collector configuration.
///
/// An explicit `path` must exist. Without one, `collector.toml` in the
/// working directory is used when present, otherwise the built-in
/// defaults. Relative output paths are anchored at the directory of the
/// file they came from.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    };

    let mut config = match &config_path {
        Some(p) => {
            debug!(path = %p.display(), "loading config");
            let content = fs::read_to_string(p).map_err(|e| {
                CollectorError::Config(format!("cannot read {}: {}", p.display(), e))
            })?;
            let mut config = from_toml(&content)?;
            if let Some(dir) = p.parent() {
                config.output.pull_requests = anchor(dir, &config.output.pull_requests);
                config.output.releases = anchor(dir, &config.output.releases);
            }
            config
        }
        None => Config::default(),
    };

    config.practice = config.practice.trim().to_string();
    validate(&config)?;
    Ok(config)
}

pub fn from_toml(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.projects.is_empty() {
        return Err(CollectorError::Config("no projects configured".to_string()));
    }
    for project in &config.projects {
        split_project(project)?;
    }
    if !(1..=100).contains(&config.http.per_page) {
        return Err(CollectorError::Config(format!(
            "http.per_page must be between 1 and 100, got {}",
            config.http.per_page
        )));
    }
    if config.practice.is_empty() {
        return Err(CollectorError::Config("practice label must not be empty".to_string()));
    }
    Ok(())
}

/// Split `owner/name` into its halves.
pub fn split_project(project: &str) -> Result<(&str, &str)> {
    match project.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(CollectorError::Config(format!(
            "invalid project identifier '{}', expected owner/name",
            project
        ))),
    }
}

fn anchor(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

/// Token and API endpoint taken from the environment (or CLI flags).
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub token: String,
    pub api_base: String,
}

impl ApiSettings {
    pub fn resolve(token: Option<String>, api_base: Option<String>) -> Result<Self> {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                CollectorError::Config(
                    "Missing GITHUB_TOKEN. Export it, set it in .env, or pass --token".to_string(),
                )
            })?;

        let api_base = api_base
            .map(|b| b.trim().trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self { token, api_base })
    }
}
