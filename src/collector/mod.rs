pub mod pull_requests;
pub mod releases;
pub mod writer;

use std::path::Path;
use tracing::info;

use crate::config::{Config, OutputConfig};
use crate::error::Result;
use crate::github::GitHubClient;
use writer::RecordWriter;

pub use pull_requests::PULL_REQUEST_COLUMNS;
pub use releases::RELEASE_COLUMNS;

/// Runs the collectors for every configured project.
pub struct Collector {
    client: GitHubClient,
    config: Config,
}

impl Collector {
    pub fn new(client: GitHubClient, config: Config) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write one row per merged pull request to `output`.
    pub async fn pull_requests_to(&self, output: &Path) -> Result<u64> {
        let mut writer = RecordWriter::create(output, &PULL_REQUEST_COLUMNS)?;
        let rows = pull_requests::collect(&self.client, &self.config, &mut writer).await?;
        info!(rows, path = %output.display(), "Wrote pull requests");
        Ok(rows)
    }

    /// Write one row per stable release to `output`.
    pub async fn releases_to(&self, output: &Path) -> Result<u64> {
        let mut writer = RecordWriter::create(output, &RELEASE_COLUMNS)?;
        let rows = releases::collect(&self.client, &self.config, &mut writer).await?;
        info!(rows, path = %output.display(), "Wrote releases");
        Ok(rows)
    }

    /// Pull requests, then releases. A pull request failure stops the run
    /// before the release file is touched.
    pub async fn all_to(&self, output: &OutputConfig) -> Result<(u64, u64)> {
        let pulls = self.pull_requests_to(&output.pull_requests).await?;
        let releases = self.releases_to(&output.releases).await?;
        Ok((pulls, releases))
    }
}
