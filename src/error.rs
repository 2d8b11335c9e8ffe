use reqwest::StatusCode;

/// Errors raised while talking to the API or writing output.
///
/// The binary converts these to `anyhow::Error` at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// A non-success status other than primary rate limiting.
    #[error("HTTP {status} for {url}: {body}")]
    Http {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// Quota stayed exhausted for more retries than the policy allows.
    #[error("rate limit still exhausted for {url} after {attempts} retries")]
    RateLimitExceeded { url: String, attempts: u32 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = CollectorError> = std::result::Result<T, E>;
