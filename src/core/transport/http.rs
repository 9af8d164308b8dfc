//! HTTP transport implementation.
//!
//! Every mounted tool server gets the same set of routes under its prefix:
//!
//! - `GET  /tools`         tool discovery
//! - `POST /tools/{name}`  invoke with the request body as input
//! - `POST /invoke`        invoke with `{"tool": ..., "input": {...}}`
//! - `POST /mcp`           JSON-RPC 2.0 (`initialize`, `tools/list`, `tools/call`, ...)
//! - `DELETE /mcp`         end a session (session affinity only)
//!
//! Failures are answered with `{"error": {"kind": ..., "message": ...}}`.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use super::SessionTable;
use super::config::HttpConfig;
use crate::core::context::SessionId;
use crate::core::gateway::{GatewayError, GatewayState, MountTable};
use crate::core::server::ToolServer;
use crate::domains::tools::ToolError;

/// Header carrying the client session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// MCP protocol revision advertised on `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

// ============================================================================
// Wire types
// ============================================================================

/// Invocation request for `POST /invoke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub tool: String,
    #[serde(default)]
    pub input: Value,
}

/// Successful invocation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub output: Value,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }
}

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Attach structured data to an error response.
    pub fn with_data(mut self, data: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.data = Some(data);
        }
        self
    }

    /// Parse error.
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::error(None, -32700, msg)
    }

    /// Method not found error.
    pub fn method_not_found(id: Option<Value>) -> Self {
        Self::error(id, -32601, "Method not found")
    }

    /// Invalid request error.
    pub fn invalid_request(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32600, msg)
    }

    /// Invalid params error.
    pub fn invalid_params(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32602, msg)
    }
}

// ============================================================================
// Error mapping
// ============================================================================

/// HTTP status for a tool failure.
pub fn status_for(err: &ToolError) -> StatusCode {
    match err {
        ToolError::UnknownTool(_) => StatusCode::NOT_FOUND,
        ToolError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ToolError::InvalidOutput(_) | ToolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ToolError::Upstream(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        (status_for(&self), Json(ErrorBody::new(self.kind(), self.to_string()))).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody::new(self.kind(), self.to_string()))).into_response()
    }
}

// ============================================================================
// Routers
// ============================================================================

/// State shared by the handlers of one mounted server.
#[derive(Clone)]
pub struct ServerState {
    server: Arc<ToolServer>,
    /// Issued session ids; `None` in stateless mode.
    sessions: Option<Arc<SessionTable>>,
}

/// Routes for one tool server, to be nested under its prefix.
pub fn server_router(server: Arc<ToolServer>, config: &HttpConfig) -> Router {
    let state = ServerState {
        server,
        sessions: (!config.stateless).then(|| Arc::new(SessionTable::from_config(config))),
    };

    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(call_tool_by_path))
        .route("/invoke", post(invoke))
        .route("/mcp", post(handle_rpc).delete(end_session))
        .with_state(state)
}

/// The gateway router: every mount nested under its prefix, plus `/` and
/// `/health`. Unmatched paths answer `NotFoundError`.
pub fn gateway_router(
    mounts: &MountTable,
    config: &HttpConfig,
    state: watch::Receiver<GatewayState>,
) -> Router {
    let info = gateway_info(mounts);
    let mut app = Router::new()
        .route(
            "/",
            get(move || {
                let info = info.clone();
                async move { Json(info) }
            }),
        )
        .route("/health", get(move || health_check(state.clone())));

    for mount in mounts.iter() {
        app = app.nest(mount.prefix(), server_router(mount.server().clone(), config));
    }

    let table = mounts.clone();
    app = app
        .fallback(move |uri: Uri| {
            let table = table.clone();
            async move { not_found(&table, &uri) }
        })
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

fn gateway_info(mounts: &MountTable) -> Value {
    let servers: Vec<Value> = mounts
        .iter()
        .map(|m| {
            json!({
                "prefix": m.prefix(),
                "server": m.server().id(),
                "tools": m.server().registry().tool_names(),
            })
        })
        .collect();

    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "transport": "HTTP",
        "protocol": "JSON-RPC 2.0",
        "mounts": servers,
    })
}

/// Health check endpoint.
async fn health_check(state: watch::Receiver<GatewayState>) -> Response {
    let current = *state.borrow();
    let (status, label) = if current == GatewayState::Ready {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };
    (
        status,
        Json(json!({
            "status": label,
            "state": current,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
        .into_response()
}

fn not_found(mounts: &MountTable, uri: &Uri) -> Response {
    let path = uri.path();
    let err = match mounts.resolve(path) {
        Ok(mount) => GatewayError::not_found(format!(
            "{} (server '{}' has no such route)",
            path,
            mount.server().id()
        )),
        Err(err) => err,
    };
    debug!("Routing miss: {}", err);
    err.into_response()
}

// ============================================================================
// Invocation handlers
// ============================================================================

fn request_session(headers: &HeaderMap) -> SessionId {
    header_session(headers).unwrap_or_else(SessionId::generate)
}

fn header_session(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(SessionId::from)
}

/// Handle `GET /tools`.
async fn list_tools(State(state): State<ServerState>) -> Json<Value> {
    Json(json!({ "tools": state.server.list_tools() }))
}

/// Handle `POST /tools/{name}`; an empty body means no arguments.
#[instrument(skip_all, fields(server = %state.server.id(), tool = %name))]
async fn call_tool_by_path(
    State(state): State<ServerState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InvokeResponse>, ToolError> {
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ToolError::invalid_input(format!("malformed JSON body: {e}")))?
    };

    let ctx = state.server.context(request_session(&headers));
    let output = state.server.invoke(&name, input, ctx).await?;
    Ok(Json(InvokeResponse { output }))
}

/// Handle `POST /invoke`.
#[instrument(skip_all, fields(server = %state.server.id()))]
async fn invoke(
    State(state): State<ServerState>,
    headers: HeaderMap,
    payload: Result<Json<InvokeRequest>, JsonRejection>,
) -> Result<Json<InvokeResponse>, ToolError> {
    let Json(request) = payload.map_err(|e| ToolError::invalid_input(e.body_text()))?;

    let ctx = state.server.context(request_session(&headers));
    let output = state.server.invoke(&request.tool, request.input, ctx).await?;
    Ok(Json(InvokeResponse { output }))
}

// ============================================================================
// JSON-RPC (MCP) handlers
// ============================================================================

/// Handle JSON-RPC requests.
#[instrument(skip_all, fields(server = %state.server.id(), method))]
async fn handle_rpc(
    State(state): State<ServerState>,
    headers: HeaderMap,
    payload: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return rpc_reply(
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::parse_error(rejection.body_text()),
            );
        }
    };
    tracing::Span::current().record("method", request.method.as_str());
    info!("Received JSON-RPC request: {}", request.method);

    if request.jsonrpc != "2.0" {
        return rpc_reply(
            StatusCode::BAD_REQUEST,
            JsonRpcResponse::invalid_request(request.id, "jsonrpc must be \"2.0\""),
        );
    }

    let mut issued = None;
    let session = match &state.sessions {
        None => SessionId::generate(),
        Some(sessions) if request.method == "initialize" => {
            let id = sessions.issue();
            issued = Some(id.clone());
            id
        }
        Some(sessions) => match header_session(&headers) {
            None => {
                return rpc_reply(
                    StatusCode::BAD_REQUEST,
                    JsonRpcResponse::invalid_request(request.id, "Missing session id"),
                );
            }
            Some(id) if !sessions.touch(&id) => {
                return rpc_reply(
                    StatusCode::NOT_FOUND,
                    JsonRpcResponse::invalid_request(request.id, "Unknown session id"),
                );
            }
            Some(id) => id,
        },
    };

    if request.method.starts_with("notifications/") {
        debug!("Received notification: {}", request.method);
        return StatusCode::ACCEPTED.into_response();
    }

    let response = process_request(&state, request, session).await;
    let mut reply = rpc_reply(StatusCode::OK, response);
    if let Some(id) = issued {
        if let Ok(value) = HeaderValue::from_str(id.as_str()) {
            reply.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    reply
}

fn rpc_reply(status: StatusCode, response: JsonRpcResponse) -> Response {
    (status, Json(response)).into_response()
}

/// Process a JSON-RPC request and return the response.
async fn process_request(
    state: &ServerState,
    request: JsonRpcRequest,
    session: SessionId,
) -> JsonRpcResponse {
    match request.method.as_str() {
        "initialize" => handle_initialize(state, request),
        "ping" => JsonRpcResponse::success(request.id, json!({})),
        "tools/list" => handle_tools_list(state, request),
        "tools/call" => handle_tools_call(state, request, session).await,
        _ => {
            warn!("Unknown method: {}", request.method);
            JsonRpcResponse::method_not_found(request.id)
        }
    }
}

/// Handle initialize request.
fn handle_initialize(state: &ServerState, request: JsonRpcRequest) -> JsonRpcResponse {
    let mut result = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": state.server.id(),
            "version": env!("CARGO_PKG_VERSION")
        }
    });
    if let Some(instructions) = state.server.instructions() {
        result["instructions"] = json!(instructions);
    }

    JsonRpcResponse::success(request.id, result)
}

/// Handle tools/list request.
fn handle_tools_list(state: &ServerState, request: JsonRpcRequest) -> JsonRpcResponse {
    JsonRpcResponse::success(request.id, json!({ "tools": state.server.list_tools() }))
}

/// Handle tools/call request.
///
/// Lookup and input errors are protocol errors; failures while running the
/// tool are reported as a result with `isError: true`.
async fn handle_tools_call(
    state: &ServerState,
    request: JsonRpcRequest,
    session: SessionId,
) -> JsonRpcResponse {
    let params = match request.params {
        Some(p) => p,
        None => return JsonRpcResponse::invalid_params(request.id, "Missing params"),
    };

    let name = match params.get("name").and_then(|v| v.as_str()) {
        Some(n) => n.to_string(),
        None => return JsonRpcResponse::invalid_params(request.id, "Missing tool name"),
    };

    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
    let ctx = state.server.context(session);

    match state.server.invoke(&name, arguments, ctx).await {
        Ok(output) => JsonRpcResponse::success(
            request.id,
            json!({
                "content": [{ "type": "text", "text": output.to_string() }],
                "structuredContent": output,
                "isError": false
            }),
        ),
        Err(e) if e.is_client_error() => JsonRpcResponse::invalid_params(request.id, e.to_string())
            .with_data(json!({ "kind": e.kind() })),
        Err(e) => JsonRpcResponse::success(
            request.id,
            json!({
                "content": [{ "type": "text", "text": e.to_string() }],
                "isError": true,
                "_meta": { "kind": e.kind() }
            }),
        ),
    }
}

/// Handle `DELETE /mcp`.
async fn end_session(State(state): State<ServerState>, headers: HeaderMap) -> StatusCode {
    let Some(sessions) = &state.sessions else {
        return StatusCode::METHOD_NOT_ALLOWED;
    };
    let Some(id) = header_session(&headers) else {
        return StatusCode::BAD_REQUEST;
    };
    if sessions.remove(&id) {
        info!("Session {} ended", id);
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
