use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::io::Write;
use std::sync::OnceLock;
use tracing::info;

use super::writer::RecordWriter;
use crate::config::Config;
use crate::error::Result;
use crate::github::types::PullDetail;
use crate::github::GitHubClient;

pub const PULL_REQUEST_COLUMNS: [&str; 21] = [
    "",
    "X.",
    "project",
    "language",
    "pull_id",
    "pull_number",
    "commits_per_pr",
    "changed_files",
    "churn",
    "comments",
    "comments_interval",
    "merge_workload",
    "description_length",
    "contributor_experience",
    "queue_rank",
    "contributor_integration",
    "stacktrace_attached",
    "activities",
    "merge_time",
    "delivery_time",
    "practice",
];

const PROGRESS_EVERY: u64 = 50;

/// One merged pull request, in `PULL_REQUEST_COLUMNS` order.
///
/// `comments_interval`, `merge_workload`, `contributor_experience`,
/// `queue_rank` and `contributor_integration` are always zero: they need
/// release cross-referencing or contributor history that is not collected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestRecord {
    pub row_index: u64,
    pub row_label: u64,
    pub project: String,
    pub language: String,
    pub pull_id: Option<u64>,
    pub pull_number: u64,
    pub commits_per_pr: u64,
    pub changed_files: u64,
    pub churn: u64,
    pub comments: u64,
    pub comments_interval: u64,
    pub merge_workload: u64,
    pub description_length: usize,
    pub contributor_experience: u64,
    pub queue_rank: u64,
    pub contributor_integration: u64,
    pub stacktrace_attached: u8,
    pub activities: u64,
    pub merge_time: f64,
    pub delivery_time: f64,
    pub practice: String,
}

/// Per-project values shared by every row.
#[derive(Debug, Clone, Copy)]
pub struct ProjectContext<'a> {
    pub project: &'a str,
    pub language: &'a str,
    pub practice: &'a str,
}

/// Build the row for one pull request, or `None` if it was never merged.
pub fn build_record(
    ctx: &ProjectContext<'_>,
    number: u64,
    detail: &PullDetail,
    row_index: u64,
) -> Option<PullRequestRecord> {
    let merged_at = detail.merged_at.as_deref().filter(|m| !m.is_empty())?;

    let commits = detail.commits.unwrap_or(0);
    let comments = detail.comments.unwrap_or(0);
    let review_comments = detail.review_comments.unwrap_or(0);
    let body = detail.body.as_deref().unwrap_or("");
    let merge_time = merge_time_hours(detail.created_at.as_deref(), Some(merged_at));

    Some(PullRequestRecord {
        row_index,
        row_label: row_index,
        project: ctx.project.to_string(),
        language: ctx.language.to_string(),
        pull_id: detail.id,
        pull_number: number,
        commits_per_pr: commits,
        changed_files: detail.changed_files.unwrap_or(0),
        churn: detail.additions.unwrap_or(0) + detail.deletions.unwrap_or(0),
        comments,
        comments_interval: 0,
        merge_workload: 0,
        description_length: body.chars().count(),
        contributor_experience: 0,
        queue_rank: 0,
        contributor_integration: 0,
        stacktrace_attached: u8::from(mentions_stacktrace(body)),
        activities: comments + review_comments + commits,
        merge_time,
        // no release data yet, so delivery ends at merge
        delivery_time: merge_time,
        practice: ctx.practice.to_string(),
    })
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Hours from creation to merge. Missing or unparsable timestamps give
/// 0.0, as does a merge that predates creation.
pub fn merge_time_hours(created_at: Option<&str>, merged_at: Option<&str>) -> f64 {
    let (Some(created), Some(merged)) = (
        created_at.and_then(parse_timestamp),
        merged_at.and_then(parse_timestamp),
    ) else {
        return 0.0;
    };
    let seconds = (merged - created).num_milliseconds() as f64 / 1000.0;
    (seconds / 3600.0).max(0.0)
}

pub fn mentions_stacktrace(body: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)stacktrace|traceback").expect("stack-trace pattern is valid"))
        .is_match(body)
}

/// Stream every project's pull requests and write one row per merged PR.
///
/// Returns the number of rows in `writer`. Row indices run across all
/// projects and continue from whatever the writer already holds.
pub async fn collect<W: Write>(
    client: &GitHubClient,
    config: &Config,
    writer: &mut RecordWriter<W>,
) -> Result<u64> {
    for project in &config.projects {
        info!(project = %project, "Collecting pull requests");
        let ctx = ProjectContext {
            project,
            language: config.language_for(project),
            practice: &config.practice,
        };

        let mut pulls = client.list_pull_requests(project);
        while let Some(summary) = pulls.next().await? {
            let Some(number) = summary.number else {
                continue;
            };

            let detail = client.get_pull_request(project, number).await?;
            let Some(record) = build_record(&ctx, number, &detail, writer.rows() + 1) else {
                continue;
            };

            writer.write(&record)?;
            if writer.rows() % PROGRESS_EVERY == 0 {
                info!(rows = writer.rows(), "Processed pull requests");
            }
        }
    }

    Ok(writer.rows())
}
