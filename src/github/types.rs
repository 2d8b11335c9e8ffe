use serde::Deserialize;

// Timestamps stay as raw strings so a malformed value can be recovered
// per record instead of failing the whole page.

/// Entry of `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullSummary {
    #[serde(default)]
    pub number: Option<u64>,
}

/// `GET /repos/{owner}/{repo}/pulls/{number}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PullDetail {
    pub id: Option<u64>,
    pub created_at: Option<String>,
    pub merged_at: Option<String>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub commits: Option<u64>,
    pub changed_files: Option<u64>,
    pub comments: Option<u64>,
    pub review_comments: Option<u64>,
    pub body: Option<String>,
}

/// Entry of `GET /repos/{owner}/{repo}/releases`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Release {
    pub tag_name: Option<String>,
    pub draft: Option<bool>,
    pub prerelease: Option<bool>,
    pub created_at: Option<String>,
    pub published_at: Option<String>,
}
