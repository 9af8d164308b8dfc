//! News tools backed by the GNews API.
//!
//! The server's lifespan reads the API key from the environment and builds
//! one pooled HTTP client, shared by every invocation until shutdown.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::core::config::NewsConfig;
use crate::core::context::RequestContext;
use crate::core::lifespan::{Lifespan, LifespanError, Resources};
use crate::domains::tools::{RegistryError, ToolError, ToolRegistry, ToolSpec};

/// Resource name of the [`NewsClient`].
pub const HTTP_CLIENT: &str = "http_client";

/// Resource name of the API key (`String`).
pub const API_KEY: &str = "api_key";

fn default_max() -> u32 {
    10
}

// ============================================================================
// Output Structures
// ============================================================================

/// A news article as returned by the upstream API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<Map<String, Value>>,
}

/// Result of a search or headlines query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    /// Total matches reported upstream, or the number of articles returned.
    pub total: u64,
    pub articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    #[serde(default, rename = "totalArticles")]
    total_articles: Option<u64>,
    #[serde(default)]
    articles: Vec<Article>,
}

impl From<UpstreamResponse> for SearchResult {
    fn from(resp: UpstreamResponse) -> Self {
        let total = match resp.total_articles {
            Some(n) if n > 0 => n,
            _ => resp.articles.len() as u64,
        };
        Self {
            total,
            articles: resp.articles,
        }
    }
}

// ============================================================================
// Client and lifespan
// ============================================================================

/// Pooled HTTP client bound to the API base URL.
#[derive(Debug, Clone)]
pub struct NewsClient {
    http: reqwest::Client,
    base_url: String,
}

impl NewsClient {
    pub fn new(config: &NewsConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET `path` with `params` and decode the article listing.
    ///
    /// Error messages never include the request URL, which carries the token.
    #[instrument(skip(self, params), fields(base = %self.base_url))]
    pub async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<SearchResult, ToolError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).query(params).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Upstream {} answered {}", path, status);
            return Err(ToolError::upstream(format!(
                "{} returned {}: {}",
                path,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let data: UpstreamResponse = resp
            .json()
            .await
            .map_err(|e| {
                ToolError::upstream(format!("malformed response from {path}: {}", e.without_url()))
            })?;
        debug!("Upstream {} returned {} articles", path, data.articles.len());
        Ok(data.into())
    }
}

/// Acquires the API key and HTTP client for the news server.
#[derive(Debug, Clone)]
pub struct NewsLifespan {
    config: NewsConfig,
}

impl NewsLifespan {
    pub fn new(config: NewsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Lifespan for NewsLifespan {
    async fn open(&self, resources: &mut Resources) -> Result<(), LifespanError> {
        let var = &self.config.api_key_var;
        let api_key = std::env::var(var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LifespanError::missing_configuration(format!(
                    "{var} environment variable is required"
                ))
            })?;

        let client = NewsClient::new(&self.config)
            .map_err(|e| LifespanError::acquire(format!("HTTP client: {e}")))?;

        info!("News client ready ({})", self.config.base_url);
        resources.insert(HTTP_CLIENT, client);
        resources.insert(API_KEY, api_key);
        Ok(())
    }

    async fn close(&self, resources: &Resources) -> Result<(), LifespanError> {
        debug!("Releasing news resources: {:?}", resources);
        Ok(())
    }
}

fn push_opt(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<String>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        params.push((name, v));
    }
}

// ============================================================================
// search
// ============================================================================

/// Parameters for the search tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Search keywords.
    pub query: String,

    /// Maximum number of articles to return.
    #[serde(default = "default_max")]
    pub max: u32,

    /// Two-letter language code, e.g. "en".
    #[serde(default)]
    pub lang: Option<String>,

    /// Two-letter country code, e.g. "us".
    #[serde(default)]
    pub country: Option<String>,
}

/// Searches news articles matching a query.
pub struct SearchTool;

impl SearchTool {
    pub const NAME: &'static str = "search";

    pub const DESCRIPTION: &'static str =
        "Search news articles matching `query` using the GNews Search endpoint.";

    #[instrument(skip_all, fields(query = %params.query))]
    pub async fn execute(
        params: SearchParams,
        ctx: RequestContext,
    ) -> Result<SearchResult, ToolError> {
        let client = ctx.resource::<NewsClient>(HTTP_CLIENT)?;
        let token = ctx.resource::<String>(API_KEY)?;

        let mut query = vec![
            ("q", params.query),
            ("token", token.as_ref().clone()),
            ("max", params.max.to_string()),
        ];
        push_opt(&mut query, "lang", params.lang);
        push_opt(&mut query, "country", params.country);

        client.get("/search", &query).await
    }

    pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
        registry.register_fn(
            ToolSpec::new(Self::NAME, Self::DESCRIPTION).with_title("GNews: Search"),
            Self::execute,
        )
    }
}

// ============================================================================
// top_headlines
// ============================================================================

/// Parameters for the top headlines tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TopHeadlinesParams {
    /// One of: world, nation, business, technology, entertainment, sports,
    /// science, health.
    #[serde(default)]
    pub topic: Option<String>,

    /// Maximum number of articles to return.
    #[serde(default = "default_max")]
    pub max: u32,

    /// Two-letter language code, e.g. "en".
    #[serde(default)]
    pub lang: Option<String>,

    /// Two-letter country code, e.g. "us".
    #[serde(default)]
    pub country: Option<String>,
}

/// Returns current top headlines.
pub struct TopHeadlinesTool;

impl TopHeadlinesTool {
    pub const NAME: &'static str = "top_headlines";

    pub const DESCRIPTION: &'static str = "Return top headlines from GNews. `topic` can be one of: world, nation, business, technology, entertainment, sports, science, health";

    #[instrument(skip_all)]
    pub async fn execute(
        params: TopHeadlinesParams,
        ctx: RequestContext,
    ) -> Result<SearchResult, ToolError> {
        let client = ctx.resource::<NewsClient>(HTTP_CLIENT)?;
        let token = ctx.resource::<String>(API_KEY)?;

        let mut query = vec![
            ("token", token.as_ref().clone()),
            ("max", params.max.to_string()),
        ];
        push_opt(&mut query, "topic", params.topic);
        push_opt(&mut query, "lang", params.lang);
        push_opt(&mut query, "country", params.country);

        client.get("/top-headlines", &query).await
    }

    pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
        registry.register_fn(
            ToolSpec::new(Self::NAME, Self::DESCRIPTION).with_title("GNews: Top Headlines"),
            Self::execute,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::SessionId;
    use crate::core::lifespan::ScopePhase;
    use crate::core::server::ToolServer;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    // Mutex to ensure env var tests run serially
    static ENV_TEST_LOCK: Mutex<()> = Mutex::new(());

    /// Stub upstream: echoes the received query back in the first article.
    async fn spawn_upstream() -> String {
        async fn search(Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
            match q.get("q").map(String::as_str) {
                Some("boom") => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
                Some("slow") => {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    (StatusCode::OK, Json(json!({ "articles": [] })))
                }
                _ => (
                    StatusCode::OK,
                    Json(json!({
                        "totalArticles": 42,
                        "articles": [{
                            "title": "Rust 2024",
                            "description": serde_json::to_string(&q).unwrap(),
                            "publishedAt": "2025-01-01T00:00:00Z",
                            "source": { "name": "Example" }
                        }]
                    })),
                ),
            }
        }

        async fn headlines(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
            Json(json!({
                "totalArticles": 0,
                "articles": [
                    { "title": serde_json::to_string(&q).unwrap() },
                    { "title": "second" }
                ]
            }))
        }

        let app = Router::new()
            .route("/search", get(search))
            .route("/top-headlines", get(headlines));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(base_url: String, key_var: &str) -> NewsConfig {
        NewsConfig {
            base_url,
            timeout_secs: 1,
            api_key_var: key_var.to_string(),
        }
    }

    fn news_server(config: NewsConfig) -> ToolServer {
        let mut registry = ToolRegistry::new();
        SearchTool::register(&mut registry).unwrap();
        TopHeadlinesTool::register(&mut registry).unwrap();
        ToolServer::new("news", registry, NewsLifespan::new(config))
    }

    async fn open_server(key_var: &str) -> ToolServer {
        let base = spawn_upstream().await;
        {
            let _lock = ENV_TEST_LOCK.lock().unwrap();
            unsafe {
                std::env::set_var(key_var, "secret-token");
            }
        }
        let server = news_server(config(base, key_var));
        server.open().await.unwrap();
        server
    }

    fn query_of(article_field: &Value) -> HashMap<String, String> {
        serde_json::from_str(article_field.as_str().unwrap()).unwrap()
    }

    #[test]
    fn test_total_falls_back_to_article_count() {
        let resp = UpstreamResponse {
            total_articles: Some(0),
            articles: vec![Article::default(), Article::default()],
        };
        assert_eq!(SearchResult::from(resp).total, 2);

        let resp = UpstreamResponse {
            total_articles: Some(7),
            articles: vec![],
        };
        assert_eq!(SearchResult::from(resp).total, 7);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_open() {
        let server = {
            let _lock = ENV_TEST_LOCK.lock().unwrap();
            unsafe {
                std::env::remove_var("NEWS_TEST_KEY_MISSING");
            }
            news_server(config("http://127.0.0.1:9".to_string(), "NEWS_TEST_KEY_MISSING"))
        };
        let err = server.open().await.unwrap_err();
        assert_eq!(err.kind(), "MissingConfigurationError");
        assert!(err.to_string().contains("NEWS_TEST_KEY_MISSING"));
        assert_eq!(server.phase(), ScopePhase::Closed);
    }

    #[tokio::test]
    async fn test_search() {
        let server = open_server("NEWS_TEST_KEY_SEARCH").await;
        let ctx = server.context(SessionId::generate());
        let output = server
            .invoke("search", json!({ "query": "rust", "lang": "en" }), ctx)
            .await
            .unwrap();

        assert_eq!(output["total"], 42);
        assert_eq!(output["articles"][0]["title"], "Rust 2024");
        assert_eq!(output["articles"][0]["publishedAt"], "2025-01-01T00:00:00Z");
        assert_eq!(output["articles"][0]["source"]["name"], "Example");

        let sent = query_of(&output["articles"][0]["description"]);
        assert_eq!(sent["q"], "rust");
        assert_eq!(sent["token"], "secret-token");
        assert_eq!(sent["max"], "10");
        assert_eq!(sent["lang"], "en");
        assert!(!sent.contains_key("country"));
    }

    #[tokio::test]
    async fn test_top_headlines() {
        let server = open_server("NEWS_TEST_KEY_HEADLINES").await;
        let ctx = server.context(SessionId::generate());
        let output = server
            .invoke("top_headlines", json!({ "topic": "science", "max": 2 }), ctx)
            .await
            .unwrap();

        assert_eq!(output["total"], 2);
        let sent = query_of(&output["articles"][0]["title"]);
        assert_eq!(sent["topic"], "science");
        assert_eq!(sent["max"], "2");
        assert!(!sent.contains_key("q"));
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let server = open_server("NEWS_TEST_KEY_STATUS").await;
        let ctx = server.context(SessionId::generate());
        let err = server
            .invoke("search", json!({ "query": "boom" }), ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UpstreamCallError");
        assert!(!err.to_string().contains("secret-token"), "{err}");
    }

    #[tokio::test]
    async fn test_upstream_timeout() {
        let server = open_server("NEWS_TEST_KEY_TIMEOUT").await;
        let ctx = server.context(SessionId::generate());
        let err = server
            .invoke("search", json!({ "query": "slow" }), ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UpstreamCallError");
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(!err.to_string().contains("secret-token"), "{err}");
        assert!(!err.to_string().contains("token="), "{err}");
    }

    #[tokio::test]
    async fn test_call_after_close_fails() {
        let server = open_server("NEWS_TEST_KEY_CLOSED").await;
        server.close().await.unwrap();
        let ctx = server.context(SessionId::generate());
        let err = server
            .invoke("search", json!({ "query": "rust" }), ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UpstreamCallError");
    }
}
