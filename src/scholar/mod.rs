use serde::Deserialize;

use crate::config::ScholarConfig;
use crate::models::Recommendation;

pub const RECOMMENDATION_LIMIT: usize = 5;

/// Client for the Semantic Scholar search and recommendations APIs.
///
/// Every failure mode (transport error, timeout, non-success status,
/// malformed payload, empty result) collapses to "no data": `None` from the
/// resolver, an empty list from the fetcher. Failures are logged and never
/// surface to the end user.
#[derive(Debug, Clone)]
pub struct ScholarClient {
    http: reqwest::Client,
    config: ScholarConfig,
}

#[derive(Debug, Deserialize)]
struct PaperSearchResponse {
    #[serde(default)]
    data: Vec<PaperSearchHit>,
}

#[derive(Debug, Deserialize)]
struct PaperSearchHit {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    #[serde(rename = "recommendedPapers", default)]
    recommended_papers: Vec<Recommendation>,
}

impl ScholarClient {
    /// Builder failure surfaces at startup; a client without the configured
    /// timeout must never be handed out.
    pub fn new(config: ScholarConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Maps a thesis title to a Semantic Scholar paper id via the paper
    /// search endpoint, taking the single best match.
    pub async fn resolve_paper_id(&self, title: &str) -> Option<String> {
        let url = format!("{}/paper/search", self.config.api_base);
        let mut request = self
            .http
            .get(&url)
            .query(&[("query", title), ("fields", "paperId"), ("limit", "1")]);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("paper search request failed for '{}': {}", title, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "paper search returned {} for '{}'",
                response.status(),
                title
            );
            return None;
        }

        let body = match response.json::<PaperSearchResponse>().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("paper search response unreadable for '{}': {}", title, e);
                return None;
            }
        };

        body.data.into_iter().next().and_then(|hit| hit.paper_id)
    }

    /// Fetches up to [`RECOMMENDATION_LIMIT`] related papers for a thesis.
    ///
    /// A cached paper id skips resolution entirely; without one the title is
    /// resolved first, and an unresolvable title yields an empty list.
    pub async fn recommendations(
        &self,
        title: &str,
        cached_id: Option<&str>,
    ) -> Vec<Recommendation> {
        let paper_id = match cached_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => match self.resolve_paper_id(title).await {
                Some(id) => id,
                None => return Vec::new(),
            },
        };

        let url = format!("{}/{}", self.config.recommend_base, paper_id);
        let limit = RECOMMENDATION_LIMIT.to_string();
        let mut request = self.http.get(&url).query(&[
            ("fields", "title,authors.name,year,abstract"),
            ("limit", limit.as_str()),
        ]);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("recommendations request failed for {}: {}", paper_id, e);
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "recommendations returned {} for {}",
                response.status(),
                paper_id
            );
            return Vec::new();
        }

        match response.json::<RecommendationsResponse>().await {
            Ok(body) => {
                let mut papers = body.recommended_papers;
                papers.truncate(RECOMMENDATION_LIMIT);
                papers
            }
            Err(e) => {
                tracing::warn!("recommendations response unreadable for {}: {}", paper_id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    use super::*;

    fn client_for(server: &ServerGuard) -> ScholarClient {
        ScholarClient::new(ScholarConfig {
            api_base: server.url(),
            recommend_base: format!("{}/recommend", server.url()),
            api_key: Some("test-key".to_string()),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn unreachable_host_resolves_to_none() {
        // nothing listens on this port; the bounded client degrades to no-data
        let client = ScholarClient::new(ScholarConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            recommend_base: "http://127.0.0.1:1".to_string(),
            api_key: None,
            timeout: Duration::from_millis(500),
        })
        .unwrap();

        assert_eq!(client.resolve_paper_id("anything").await, None);
        assert!(client.recommendations("anything", Some("p1")).await.is_empty());
    }

    #[tokio::test]
    async fn resolves_first_search_hit() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "Attention Is All You Need".into()),
                Matcher::UrlEncoded("fields".into(), "paperId".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(json!({"data": [{"paperId": "abc123"}]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let id = client.resolve_paper_id("Attention Is All You Need").await;

        mock.assert_async().await;
        assert_eq!(id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn empty_hits_server_error_and_bad_json_all_resolve_to_none() {
        let mut server = Server::new_async().await;

        server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"data": []}).to_string())
            .create_async()
            .await;
        let client = client_for(&server);
        assert_eq!(client.resolve_paper_id("no hits").await, None);

        server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;
        let client = client_for(&server);
        assert_eq!(client.resolve_paper_id("server down").await, None);

        server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;
        let client = client_for(&server);
        assert_eq!(client.resolve_paper_id("garbled").await, None);
    }

    #[tokio::test]
    async fn fetcher_returns_empty_when_resolution_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server);
        let papers = client.recommendations("unknown thesis", None).await;
        assert!(papers.is_empty());
    }

    #[tokio::test]
    async fn cached_id_skips_the_search_endpoint() {
        let mut server = Server::new_async().await;
        let search = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let recommend = server
            .mock("GET", "/recommend/cached42")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("fields".into(), "title,authors.name,year,abstract".into()),
                Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "recommendedPapers": [
                        {
                            "title": "Related Work",
                            "authors": [{"name": "Ada Lovelace"}],
                            "year": 2021,
                            "abstract": "A related paper."
                        }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let papers = client.recommendations("ignored title", Some("cached42")).await;

        search.assert_async().await;
        recommend.assert_async().await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title.as_deref(), Some("Related Work"));
        assert_eq!(papers[0].year, Some(2021));
    }

    #[tokio::test]
    async fn recommendation_failures_degrade_to_empty() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/recommend/p1")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.recommendations("t", Some("p1")).await.is_empty());
    }
}
