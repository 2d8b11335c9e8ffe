use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_PRACTICE: &str = "CI";
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repositories to collect from, as `owner/name`.
    pub projects: Vec<String>,
    /// CI/NO-CI label stamped on every row. Classification happens elsewhere.
    pub practice: String,
    pub output: OutputConfig,
    pub languages: BTreeMap<String, String>,
    pub rate_limit: RateLimitConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub pull_requests: PathBuf,
    pub releases: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Lower bound on every rate-limit sleep.
    pub min_wait_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub per_page: u32,
}

impl Config {
    pub fn language_for(&self, project: &str) -> &str {
        self.languages
            .get(project)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LANGUAGE)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert("serverless/serverless".to_string(), "JavaScript".to_string());
        languages.insert("scikit-image/scikit-image".to_string(), "Python".to_string());
        languages.insert("dropwizard/dropwizard".to_string(), "Java".to_string());
        languages.insert("bundler/bundler".to_string(), "Ruby".to_string());
        languages.insert("laravel/laravel".to_string(), "PHP".to_string());

        Config {
            projects: vec![
                "serverless/serverless".to_string(),
                "scikit-image/scikit-image".to_string(),
                "dropwizard/dropwizard".to_string(),
                "bundler/bundler".to_string(),
                "laravel/laravel".to_string(),
            ],
            practice: DEFAULT_PRACTICE.to_string(),
            output: OutputConfig::default(),
            languages,
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            pull_requests: PathBuf::from("datasets/pull_requests_meta_data.csv"),
            releases: PathBuf::from("datasets/releases_meta_data.csv"),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            min_wait_secs: 5,
            max_retries: 10,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 30,
            per_page: 100,
        }
    }
}
