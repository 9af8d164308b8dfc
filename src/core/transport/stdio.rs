//! STDIO transport implementation.
//!
//! Exposes a single tool server over standard input/output using rmcp. The
//! server's lifespan scope is opened before the first message is read and
//! closed once the client disconnects.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt, model::*,
    service::RequestContext,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{TransportError, TransportResult};
use crate::core::context::SessionId;
use crate::core::server::ToolServer;
use crate::domains::tools::{ToolDescriptor, ToolError};

/// rmcp handler backed by a [`ToolServer`].
///
/// One stdio connection is one session.
#[derive(Clone)]
pub struct StdioServer {
    server: Arc<ToolServer>,
    session: SessionId,
}

impl StdioServer {
    pub fn new(server: Arc<ToolServer>) -> Self {
        Self {
            server,
            session: SessionId::generate(),
        }
    }
}

fn to_rmcp_tool(descriptor: ToolDescriptor) -> Tool {
    let schema = match descriptor.input_schema {
        Value::Object(map) => map,
        _ => Default::default(),
    };
    let output_schema = match descriptor.output_schema {
        Value::Object(map) => Some(Arc::new(map)),
        _ => None,
    };

    Tool {
        name: descriptor.name.into(),
        title: descriptor.title,
        description: Some(descriptor.description.into()),
        input_schema: Arc::new(schema),
        output_schema,
        annotations: None,
        icons: None,
        meta: None,
    }
}

fn to_mcp_error(err: ToolError) -> McpError {
    let data = Some(serde_json::json!({ "kind": err.kind() }));
    match err {
        ToolError::UnknownTool(_) | ToolError::InvalidInput(_) => {
            McpError::invalid_params(err.to_string(), data)
        }
        _ => McpError::internal_error(err.to_string(), data),
    }
}

impl ServerHandler for StdioServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: self.server.instructions().map(str::to_string),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.server.id().to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }

    #[instrument(skip_all, fields(server = %self.server.id()))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        info!("Listing tools");
        Ok(ListToolsResult {
            tools: self.server.list_tools().into_iter().map(to_rmcp_tool).collect(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip_all, fields(server = %self.server.id(), tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let input = request.arguments.map(Value::Object).unwrap_or(Value::Null);
        let ctx = self.server.context(self.session.clone());

        match self.server.invoke(&request.name, input, ctx).await {
            Ok(output) => {
                let mut result = CallToolResult::success(vec![Content::text(output.to_string())]);
                result.structured_content = Some(output);
                Ok(result)
            }
            Err(e) if e.is_client_error() => Err(to_mcp_error(e)),
            Err(e) => {
                warn!(kind = e.kind(), "Tool failed: {}", e);
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

/// STDIO transport handler.
pub struct StdioTransport;

impl StdioTransport {
    /// Run `server` over stdin/stdout until the client disconnects.
    pub async fn run(server: Arc<ToolServer>) -> TransportResult<()> {
        server
            .open()
            .await
            .map_err(|e| TransportError::startup(server.id(), e))?;

        info!("Ready - serving '{}' via stdin/stdout", server.id());
        let result = Self::serve(server.clone()).await;

        if let Err(e) = server.close().await {
            warn!(server = server.id(), "Failed to close scope: {}", e);
        }
        info!("STDIO transport finished");
        result
    }

    async fn serve(server: Arc<ToolServer>) -> TransportResult<()> {
        let service = StdioServer::new(server)
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| TransportError::init(e.to_string()))?;

        service
            .waiting()
            .await
            .map_err(|e| TransportError::ServiceError(e.to_string()))?;
        Ok(())
    }
}
