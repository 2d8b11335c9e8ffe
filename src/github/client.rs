use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::paginator::Paginator;
use super::rate_limit::{self, RateLimitPolicy};
use super::types::{PullDetail, PullSummary, Release};
use crate::error::{CollectorError, Result};

const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Decoded body plus the headers it came with.
#[derive(Debug)]
pub struct ApiResponse {
    pub body: Value,
    pub headers: HeaderMap,
}

pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    policy: RateLimitPolicy,
    per_page: u32,
}

impl GitHubClient {
    pub fn new(
        token: Option<&str>,
        api_base: impl Into<String>,
        policy: RateLimitPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));
        if let Some(token) = token {
            let mut auth = HeaderValue::from_str(&format!("token {}", token))
                .map_err(|e| CollectorError::Config(format!("invalid token: {}", e)))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let api_base: String = api_base.into();
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            policy,
            per_page: 100,
        })
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// GET `url`, sleeping through primary rate limiting.
    ///
    /// The identical request is re-sent after each wait, up to
    /// `policy.max_retries` times. Every other non-success status fails
    /// straight away.
    pub async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<ApiResponse> {
        let mut retries = 0u32;
        loop {
            let response = self.client.get(url).query(query).send().await?;
            let status = response.status();
            let headers = response.headers().clone();

            if rate_limit::is_quota_exhausted(status, &headers) {
                if retries >= self.policy.max_retries {
                    return Err(CollectorError::RateLimitExceeded {
                        url: url.to_string(),
                        attempts: retries,
                    });
                }
                let wait = rate_limit::wait_duration(
                    rate_limit::reset_epoch(&headers),
                    chrono::Utc::now(),
                    self.policy.min_wait,
                );
                warn!(url, wait_secs = wait.as_secs_f64(), "Rate limit reached, sleeping");
                tokio::time::sleep(wait).await;
                retries += 1;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CollectorError::Http {
                    status,
                    url: url.to_string(),
                    body,
                });
            }

            let bytes = response.bytes().await?;
            let body = serde_json::from_slice(&bytes).map_err(|source| CollectorError::Decode {
                url: url.to_string(),
                source,
            })?;
            debug!(url, ?query, "fetched");
            return Ok(ApiResponse { body, headers });
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get_json(url, &[]).await?;
        debug!(url, remaining = ?rate_limit::remaining(&response.headers), "decoding");
        serde_json::from_value(response.body).map_err(|source| CollectorError::Decode {
            url: url.to_string(),
            source,
        })
    }

    pub fn list_pull_requests(&self, project: &str) -> Paginator<'_, PullSummary> {
        Paginator::new(self, format!("{}/repos/{}/pulls", self.api_base, project), self.per_page)
            .with_query("state", "all")
    }

    pub async fn get_pull_request(&self, project: &str, number: u64) -> Result<PullDetail> {
        self.get(&format!("{}/repos/{}/pulls/{}", self.api_base, project, number))
            .await
    }

    pub fn list_releases(&self, project: &str) -> Paginator<'_, Release> {
        Paginator::new(self, format!("{}/repos/{}/releases", self.api_base, project), self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Instant;

    fn test_client(base: &str, min_wait: Duration, max_retries: u32) -> GitHubClient {
        GitHubClient::new(
            Some("test_token"),
            base,
            RateLimitPolicy { min_wait, max_retries },
            Duration::from_secs(30),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sends_auth_and_returns_body_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/o/r/pulls/1")
            .match_header("authorization", "token test_token")
            .match_header("accept", ACCEPT_V3)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("x-ratelimit-remaining", "4999")
            .with_body(r#"{"number": 1}"#)
            .create_async()
            .await;

        let client = test_client(&server.url(), Duration::from_millis(10), 3);
        let url = format!("{}/repos/o/r/pulls/1", server.url());
        let response = client.get_json(&url, &[]).await.unwrap();

        assert_eq!(response.body["number"], 1);
        assert_eq!(response.headers.get("x-ratelimit-remaining").unwrap(), "4999");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retries_exhausted_quota_until_success() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/repos/o/r/releases")
            .match_query(Matcher::UrlEncoded("page".into(), "3".into()))
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", "0")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .expect(2)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/repos/o/r/releases")
            .match_query(Matcher::UrlEncoded("page".into(), "3".into()))
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url(), Duration::from_millis(50), 5);
        let url = format!("{}/repos/o/r/releases", server.url());
        let started = Instant::now();
        let response = client
            .get_json(&url, &[("page".to_string(), "3".to_string())])
            .await
            .unwrap();

        assert_eq!(response.body, serde_json::json!([]));
        assert!(started.elapsed() >= Duration::from_millis(100));
        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn waits_for_reset_when_longer_than_minimum() {
        let mut server = mockito::Server::new_async().await;
        let reset = (chrono::Utc::now().timestamp() + 2).to_string();
        server
            .mock("GET", "/rate")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", &reset)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/rate")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = test_client(&server.url(), Duration::from_millis(10), 1);
        let started = Instant::now();
        client
            .get_json(&format!("{}/rate", server.url()), &[])
            .await
            .unwrap();

        // reset is 1-2s away depending on where in the current second we started
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn forbidden_with_quota_left_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/o/r/pulls")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "17")
            .with_body(r#"{"message": "Resource not accessible"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url(), Duration::from_millis(10), 5);
        let err = client
            .get_json(&format!("{}/repos/o/r/pulls", server.url()), &[])
            .await
            .unwrap_err();

        match err {
            CollectorError::Http { status, body, .. } => {
                assert_eq!(status, reqwest::StatusCode::FORBIDDEN);
                assert!(body.contains("Resource not accessible"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/boom")
            .with_status(502)
            .create_async()
            .await;

        let client = test_client(&server.url(), Duration::from_millis(10), 5);
        let err = client
            .get_json(&format!("{}/boom", server.url()), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Http { status, .. } if status.as_u16() == 502));
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/limited")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", "0")
            .expect(3)
            .create_async()
            .await;

        let client = test_client(&server.url(), Duration::from_millis(5), 2);
        let err = client
            .get_json(&format!("{}/limited", server.url()), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, CollectorError::RateLimitExceeded { attempts: 2, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_json_success_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/html")
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;

        let client = test_client(&server.url(), Duration::from_millis(5), 1);
        let err = client
            .get_json(&format!("{}/html", server.url()), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Decode { .. }));
    }
}
