use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};
use std::io::Write;
use tracing::info;

use super::pull_requests::parse_timestamp;
use super::writer::RecordWriter;
use crate::config::Config;
use crate::error::Result;
use crate::github::types::Release;
use crate::github::GitHubClient;

pub const RELEASE_COLUMNS: [&str; 10] = [
    "project",
    "title",
    "startedAt",
    "publishedAt",
    "release_duration",
    "created_pull_requests",
    "merged_pull_requests",
    "released_pull_requests",
    "sum_submitted_pr_churn",
    "practice",
];

/// Tag fragments marking a pre-release, matched against the lowercased tag.
pub const UNSTABLE_TAG_TOKENS: [&str; 5] = ["alpha", "beta", "rc", "pre", "dev"];

const SECONDS_PER_DAY: i64 = 86_400;
const OUTPUT_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// One stable release, in `RELEASE_COLUMNS` order.
///
/// The PR counts and churn sum stay zero/blank: filling them means joining
/// against the pull-request data set, which is not done here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseRecord {
    pub project: String,
    pub title: String,
    #[serde(serialize_with = "output_datetime")]
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "output_datetime")]
    pub published_at: DateTime<Utc>,
    pub release_duration: i64,
    pub created_pull_requests: u64,
    pub merged_pull_requests: u64,
    pub released_pull_requests: u64,
    pub sum_submitted_pr_churn: Option<u64>,
    pub practice: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StableRelease {
    pub tag: String,
    pub published_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}

fn output_datetime<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(OUTPUT_DATETIME))
}

pub fn is_stable_release(tag: &str, prerelease: bool, draft: bool) -> bool {
    if prerelease || draft {
        return false;
    }
    let lowered = tag.to_lowercase();
    !UNSTABLE_TAG_TOKENS.iter().any(|token| lowered.contains(token))
}

/// Keep published, stable releases with a non-empty tag.
pub fn stable_releases(releases: Vec<Release>) -> Vec<StableRelease> {
    releases
        .into_iter()
        .filter_map(|release| {
            let tag = release.tag_name.as_deref().unwrap_or("").trim();
            if tag.is_empty() {
                return None;
            }
            if !is_stable_release(
                tag,
                release.prerelease.unwrap_or(false),
                release.draft.unwrap_or(false),
            ) {
                return None;
            }
            let published_at = release.published_at.as_deref().and_then(parse_timestamp)?;
            Some(StableRelease {
                tag: tag.to_string(),
                published_at,
                created_at: release.created_at.as_deref().and_then(parse_timestamp),
            })
        })
        .collect()
}

/// Turn a project's stable releases into rows, newest first.
///
/// Each window opens one second after the previous (older) release was
/// published; the oldest opens at its own creation time, or at its publish
/// time when that is unknown.
pub fn release_windows(project: &str, practice: &str, mut releases: Vec<StableRelease>) -> Vec<ReleaseRecord> {
    releases.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    releases
        .iter()
        .enumerate()
        .map(|(i, release)| {
            let started_at = match releases.get(i + 1) {
                Some(older) => older.published_at + Duration::seconds(1),
                None => release.created_at.unwrap_or(release.published_at),
            };
            let elapsed = (release.published_at - started_at).num_seconds().max(0);

            ReleaseRecord {
                project: project.to_string(),
                title: release.tag.clone(),
                started_at,
                published_at: release.published_at,
                release_duration: elapsed / SECONDS_PER_DAY,
                created_pull_requests: 0,
                merged_pull_requests: 0,
                released_pull_requests: 0,
                sum_submitted_pr_churn: None,
                practice: practice.to_string(),
            }
        })
        .collect()
}

/// Fetch every project's releases up front and write their windows.
///
/// Returns the number of rows in `writer`.
pub async fn collect<W: Write>(
    client: &GitHubClient,
    config: &Config,
    writer: &mut RecordWriter<W>,
) -> Result<u64> {
    for project in &config.projects {
        info!(project = %project, "Collecting releases");
        let releases = client.list_releases(project).collect_all().await?;
        let fetched = releases.len();

        let records = release_windows(project, &config.practice, stable_releases(releases));
        info!(project = %project, fetched, stable = records.len(), "Releases filtered");

        for record in &records {
            writer.write(record)?;
        }
    }

    info!(total = writer.rows(), "Collected stable releases");
    Ok(writer.rows())
}
