use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use tracing::debug;

use super::client::GitHubClient;
use super::rate_limit;
use crate::error::{CollectorError, Result};

/// Walks a `page`/`per_page` list endpoint one item at a time.
///
/// Pages are fetched lazily starting at 1 and the walk ends at the first
/// empty page. Once finished it stays finished; start a new paginator to
/// walk again. Items inserted upstream mid-walk may be skipped or repeated.
pub struct Paginator<'a, T> {
    client: &'a GitHubClient,
    url: String,
    query: Vec<(String, String)>,
    per_page: u32,
    next_page: u32,
    buffer: VecDeque<T>,
    done: bool,
}

impl<'a, T: DeserializeOwned> Paginator<'a, T> {
    pub fn new(client: &'a GitHubClient, url: String, per_page: u32) -> Self {
        Self {
            client,
            url,
            query: Vec::new(),
            per_page,
            next_page: 1,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Extra fixed query parameter sent with every page.
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Next item, fetching another page when the current one is used up.
    pub async fn next(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.done {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let mut query = self.query.clone();
        query.push(("per_page".to_string(), self.per_page.to_string()));
        query.push(("page".to_string(), self.next_page.to_string()));

        let response = self.client.get_json(&self.url, &query).await?;
        let items: Vec<T> =
            serde_json::from_value(response.body).map_err(|source| CollectorError::Decode {
                url: self.url.clone(),
                source,
            })?;

        debug!(
            url = %self.url,
            page = self.next_page,
            items = items.len(),
            remaining = ?rate_limit::remaining(&response.headers),
            "page fetched"
        );
        if items.is_empty() {
            self.done = true;
        } else {
            self.next_page += 1;
            self.buffer.extend(items);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::rate_limit::RateLimitPolicy;
    use mockito::Matcher;
    use serde_json::Value;
    use std::time::Duration;

    fn client(base: &str) -> GitHubClient {
        GitHubClient::new(None, base, RateLimitPolicy::default(), Duration::from_secs(30))
            .unwrap()
            .with_per_page(2)
    }

    fn page(n: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), n.into()),
            Matcher::UrlEncoded("per_page".into(), "2".into()),
        ])
    }

    #[tokio::test]
    async fn yields_every_item_until_first_empty_page() {
        let mut server = mockito::Server::new_async().await;
        let p1 = server
            .mock("GET", "/items")
            .match_query(page("1"))
            .with_body(r#"[{"n": 1}, {"n": 2}]"#)
            .expect(1)
            .create_async()
            .await;
        let p2 = server
            .mock("GET", "/items")
            .match_query(page("2"))
            .with_body(r#"[{"n": 3}]"#)
            .expect(1)
            .create_async()
            .await;
        let p3 = server
            .mock("GET", "/items")
            .match_query(page("3"))
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let p4 = server
            .mock("GET", "/items")
            .match_query(page("4"))
            .with_body(r#"[{"n": 99}]"#)
            .expect(0)
            .create_async()
            .await;

        let client = client(&server.url());
        let items: Vec<Value> = Paginator::new(&client, format!("{}/items", server.url()), 2)
            .collect_all()
            .await
            .unwrap();

        let numbers: Vec<i64> = items.iter().map(|v| v["n"].as_i64().unwrap()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        p1.assert_async().await;
        p2.assert_async().await;
        p3.assert_async().await;
        p4.assert_async().await;
    }

    #[tokio::test]
    async fn stays_exhausted_after_the_end() {
        let mut server = mockito::Server::new_async().await;
        let empty = server
            .mock("GET", "/items")
            .match_query(Matcher::Any)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let client = client(&server.url());
        let mut pages: Paginator<'_, Value> =
            Paginator::new(&client, format!("{}/items", server.url()), 2);
        assert!(pages.next().await.unwrap().is_none());
        assert!(pages.next().await.unwrap().is_none());
        empty.assert_async().await;
    }

    #[tokio::test]
    async fn fixed_query_is_sent_with_each_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pulls")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "all".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_body("[]")
            .create_async()
            .await;

        let client = client(&server.url());
        let items: Vec<Value> = Paginator::new(&client, format!("{}/pulls", server.url()), 2)
            .with_query("state", "all")
            .collect_all()
            .await
            .unwrap();
        assert!(items.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn object_page_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/items")
            .match_query(Matcher::Any)
            .with_body(r#"{"message": "Moved"}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let err = Paginator::<Value>::new(&client, format!("{}/items", server.url()), 2)
            .collect_all()
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Decode { .. }));
    }
}
