//! Documentation tools.
//!
//! Serve documentation entries from a mocked store.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, instrument};

use super::common::{NoParams, Record};
use crate::core::context::RequestContext;
use crate::domains::tools::{RegistryError, ToolError, ToolRegistry, ToolSpec};

// ============================================================================
// fetch_documentation
// ============================================================================

/// Parameters for the fetch documentation tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FetchDocumentationParams {
    /// Topic to look up.
    pub topic: String,
}

/// Fetches the documentation entry for a topic.
pub struct FetchDocumentationTool;

impl FetchDocumentationTool {
    pub const NAME: &'static str = "fetch_documentation";

    pub const DESCRIPTION: &'static str = "Fetches documentation for a given topic.";

    #[instrument(skip_all, fields(topic = %params.topic))]
    pub async fn execute(
        params: FetchDocumentationParams,
        _ctx: RequestContext,
    ) -> Result<Record, ToolError> {
        info!("Fetching documentation for '{}'", params.topic);
        let body = format!(
            "This is a mocked documentation entry for '{}'. In a real system, this would be fetched from a database.",
            params.topic
        );
        Ok(Record::mocked(format!("Documentation for {}", params.topic), body)
            .with_topic(params.topic))
    }

    pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
        registry.register_fn(
            ToolSpec::new(Self::NAME, Self::DESCRIPTION).with_title("Fetch Documentation"),
            Self::execute,
        )
    }
}

// ============================================================================
// get_documentation_from_database
// ============================================================================

/// Returns the general documentation entry.
pub struct GetDocumentationFromDatabaseTool;

impl GetDocumentationFromDatabaseTool {
    pub const NAME: &'static str = "get_documentation_from_database";

    pub const DESCRIPTION: &'static str = "Returns documentation data from a database.";

    pub async fn execute(_params: NoParams, _ctx: RequestContext) -> Result<Record, ToolError> {
        Ok(Record::mocked(
            "How to Use MCP Servers",
            "This is a mocked documentation entry from the database. MCP servers expose tools to LLMs.",
        ))
    }

    pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
        registry.register_fn(
            ToolSpec::new(Self::NAME, Self::DESCRIPTION),
            Self::execute,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lifespan::NoResources;
    use crate::core::server::ToolServer;
    use crate::core::context::SessionId;
    use serde_json::json;

    async fn docs_server() -> ToolServer {
        let mut registry = ToolRegistry::new();
        FetchDocumentationTool::register(&mut registry).unwrap();
        GetDocumentationFromDatabaseTool::register(&mut registry).unwrap();
        let server = ToolServer::new("docs", registry, NoResources);
        server.open().await.unwrap();
        server
    }

    #[tokio::test]
    async fn test_fetch_documentation() {
        let server = docs_server().await;
        let ctx = server.context(SessionId::generate());
        let output = server
            .invoke("fetch_documentation", json!({ "topic": "x" }), ctx)
            .await
            .unwrap();
        assert_eq!(
            output,
            json!({
                "title": "Documentation for x",
                "body": "This is a mocked documentation entry for 'x'. In a real system, this would be fetched from a database.",
                "source": "mocked_database",
                "topic": "x"
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_documentation_requires_topic() {
        let server = docs_server().await;
        let ctx = server.context(SessionId::generate());
        let err = server
            .invoke("fetch_documentation", json!({ "topic": 3 }), ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidInputError");
    }

    #[tokio::test]
    async fn test_get_documentation_from_database() {
        let server = docs_server().await;
        let ctx = server.context(SessionId::generate());
        let output = server
            .invoke("get_documentation_from_database", json!({}), ctx)
            .await
            .unwrap();
        assert_eq!(output["title"], "How to Use MCP Servers");
        assert_eq!(output["source"], "mocked_database");
        assert!(output.get("topic").is_none());
    }
}
