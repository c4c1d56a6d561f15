//! Web search: `google` command and the search API client behind it.

use async_trait::async_trait;
use issola_config::SearchConfig;
use issola_core::command::{Command, CommandArgs, CommandName, required_str};
use issola_core::error::CommandError;
use issola_memory::VisitGuard;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Anything that turns a query into a list of result URLs.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<String>, CommandError>;
}

/// Client for a RapidAPI-style JSON search endpoint.
///
/// Sends `query`, `limit` and `related_keywords=false` as query parameters
/// and reads `results[].url` from the response.
pub struct HttpSearchEngine {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    api_host: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    url: Option<String>,
}

impl HttpSearchEngine {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, api_host: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: api_url.into(),
            api_key,
            api_host: api_host.into(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.api_url, config.api_key.clone(), &config.api_host)
    }
}

#[async_trait]
impl SearchEngine for HttpSearchEngine {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<String>, CommandError> {
        let Some(api_key) = &self.api_key else {
            return Err(CommandError::ExecutionFailed {
                command: "google".into(),
                reason: "no search API key configured (set ISSOLA_SEARCH_API_KEY)".into(),
            });
        };

        let limit = num_results.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .query(&[
                ("query", query),
                ("limit", limit.as_str()),
                ("related_keywords", "false"),
            ])
            .send()
            .await
            .map_err(|e| CommandError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(CommandError::HttpStatus(status));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CommandError::Http(format!("invalid search response: {e}")))?;
        let urls: Vec<String> = body.results.into_iter().filter_map(|hit| hit.url).collect();
        info!(query, found = urls.len(), "Search completed");
        Ok(urls)
    }
}

/// `google`: search and drop URLs that were already browsed.
pub struct GoogleCommand {
    engine: Arc<dyn SearchEngine>,
    visited: Arc<VisitGuard>,
    num_results: usize,
}

impl GoogleCommand {
    pub fn new(engine: Arc<dyn SearchEngine>, visited: Arc<VisitGuard>, num_results: usize) -> Self {
        Self {
            engine,
            visited,
            num_results,
        }
    }
}

#[async_trait]
impl Command for GoogleCommand {
    fn name(&self) -> &str {
        CommandName::Google.as_str()
    }

    fn description(&self) -> &str {
        "Google Search"
    }

    fn required_args(&self) -> &[&'static str] {
        &["input"]
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let query = required_str(&args, "input")?;
        let urls = self.engine.search(&query, self.num_results).await?;
        let total = urls.len();
        let fresh = self.visited.unseen(urls).await;
        debug!(query = %query, total, fresh = fresh.len(), "Scrubbed visited URLs");
        serde_json::to_string(&fresh).map_err(|e| CommandError::ExecutionFailed {
            command: "google".into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedEngine(Vec<&'static str>);

    #[async_trait]
    impl SearchEngine for FixedEngine {
        async fn search(&self, _query: &str, n: usize) -> Result<Vec<String>, CommandError> {
            Ok(self.0.iter().take(n).map(|s| s.to_string()).collect())
        }
    }

    fn args(value: serde_json::Value) -> CommandArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn visited_urls_are_scrubbed() {
        let visited = Arc::new(VisitGuard::ephemeral());
        visited.mark("https://b.example").await.unwrap();
        let engine = Arc::new(FixedEngine(vec![
            "https://a.example",
            "https://b.example",
            "https://c.example",
        ]));

        let out = GoogleCommand::new(engine, visited, 3)
            .execute(args(json!({"input": "rust"})))
            .await
            .unwrap();
        let urls: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(urls, vec!["https://a.example", "https://c.example"]);
    }

    #[tokio::test]
    async fn http_engine_sends_rapidapi_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("query", "tokio runtime"))
            .and(query_param("limit", "2"))
            .and(query_param("related_keywords", "false"))
            .and(header("X-RapidAPI-Key", "secret"))
            .and(header("X-RapidAPI-Host", "search.example"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"url": "https://tokio.rs", "title": "Tokio"},
                    {"title": "no url"},
                    {"url": "https://docs.rs/tokio"}
                ]
            })))
            .mount(&server)
            .await;

        let engine = HttpSearchEngine::new(server.uri(), Some("secret".into()), "search.example");
        let urls = engine.search("tokio runtime", 2).await.unwrap();
        assert_eq!(urls, vec!["https://tokio.rs", "https://docs.rs/tokio"]);
    }

    #[tokio::test]
    async fn http_engine_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let engine = HttpSearchEngine::new(server.uri(), Some("bad".into()), "search.example");
        let err = engine.search("x", 3).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 403 error");
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let engine = HttpSearchEngine::new("http://localhost:1", None, "h");
        let err = engine.search("x", 3).await.unwrap_err();
        assert!(err.to_string().contains("ISSOLA_SEARCH_API_KEY"));
    }
}
