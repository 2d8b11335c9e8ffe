pub mod client;
pub mod paginator;
pub mod rate_limit;
pub mod types;

pub use client::GitHubClient;
pub use rate_limit::RateLimitPolicy;
