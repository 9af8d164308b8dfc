//! Tool server: a registry bound to one lifespan scope.
//!
//! ## Invocation
//!
//! [`ToolServer::invoke`] is the transport-independent entry point used by
//! both the HTTP gateway and the stdio transport:
//!
//! 1. look up the tool (`UnknownToolError`)
//! 2. validate the input against its schema (`InvalidInputError`)
//! 3. run the handler with the request context
//! 4. validate the output against its schema (`InvalidOutputError`)
//!
//! A panicking handler is reported as an internal error instead of taking
//! the server down.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::context::{RequestContext, SessionId};
use super::lifespan::{Lifespan, LifespanError, LifespanScope, ScopePhase};
use crate::domains::tools::{ToolDescriptor, ToolError, ToolRegistry};

/// An addressable unit bundling a tool registry with its lifespan scope.
pub struct ToolServer {
    /// Server identifier (also the default mount segment).
    id: Arc<str>,

    /// Instructions advertised to clients on `initialize`.
    instructions: Option<String>,

    /// Registered tools, immutable after construction.
    registry: ToolRegistry,

    /// Shared resources for the server's handlers.
    scope: Arc<LifespanScope>,
}

impl ToolServer {
    /// Create a server from a populated registry and its lifespan.
    pub fn new(
        id: impl Into<String>,
        registry: ToolRegistry,
        lifespan: impl Lifespan + 'static,
    ) -> Self {
        let id: String = id.into();
        let scope = Arc::new(LifespanScope::new(id.clone(), lifespan));
        Self {
            id: Arc::from(id),
            instructions: None,
            registry,
            scope,
        }
    }

    /// Set the instructions advertised to clients.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Tool descriptors for discovery.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list()
    }

    /// Current phase of the server's lifespan scope.
    pub fn phase(&self) -> ScopePhase {
        self.scope.phase()
    }

    /// Open the lifespan scope.
    pub async fn open(&self) -> Result<(), LifespanError> {
        self.scope.open().await
    }

    /// Close the lifespan scope.
    pub async fn close(&self) -> Result<(), LifespanError> {
        self.scope.close().await
    }

    /// Build the context for one invocation in `session_id`.
    pub fn context(&self, session_id: SessionId) -> RequestContext {
        RequestContext::new(session_id, self.id.clone(), self.scope.clone())
    }

    /// Invoke a tool by name.
    ///
    /// The invocation counts as in flight for the scope: if the scope starts
    /// closing first, the handler is dropped and the call fails with
    /// [`ToolError::Upstream`].
    #[instrument(skip(self, input, ctx), fields(server = %self.id, session = %ctx.session_id()))]
    pub async fn invoke(
        &self,
        name: &str,
        input: Value,
        ctx: RequestContext,
    ) -> Result<Value, ToolError> {
        let tool = self.registry.lookup(name).inspect_err(|_| {
            warn!("Unknown tool requested: {}", name);
        })?;

        // Tools without parameters may be called with no arguments at all.
        let input = match input {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        tool.validate_input(&input)?;

        let _in_flight = self.scope.enter();
        let closing = self.scope.closing();

        info!("Invoking tool: {}", name);
        let handler = {
            let tool = tool.clone();
            // Built lazily so a panic before the handler's first await is caught too.
            async move { tool.call(input, ctx).await }
        };
        let guarded = AssertUnwindSafe(handler).catch_unwind();

        let output = tokio::select! {
            biased;
            () = closing.cancelled() => {
                warn!("Tool {} cancelled: server is shutting down", name);
                return Err(ToolError::upstream(format!(
                    "server '{}' is shutting down",
                    self.id
                )));
            }
            result = guarded => result
                .map_err(|_| ToolError::internal(format!("tool '{}' panicked", name)))?
                .inspect_err(|e| warn!("Tool {} failed: {}", name, e))?,
        };

        tool.validate_output(&output).inspect_err(|e| {
            warn!("Tool {} violated its output schema: {}", name, e);
        })?;

        Ok(output)
    }
}

impl std::fmt::Debug for ToolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServer")
            .field("id", &self.id)
            .field("tools", &self.registry.tool_names())
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lifespan::{NoResources, Resources};
    use crate::domains::tools::{Tool, ToolFuture, ToolHandler, ToolSpec};
    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Deserialize, JsonSchema)]
    struct SlowParams {
        value: u64,
        delay_ms: u64,
    }

    #[derive(Serialize, JsonSchema)]
    struct SlowOutput {
        value: u64,
        session: String,
    }

    #[derive(Deserialize, JsonSchema)]
    struct NoParams {}

    #[derive(Serialize, JsonSchema)]
    struct Greeting {
        greeting: String,
    }

    struct GreetingLifespan;

    #[async_trait]
    impl Lifespan for GreetingLifespan {
        async fn open(&self, resources: &mut Resources) -> Result<(), LifespanError> {
            resources.insert("greeting", String::from("hello"));
            Ok(())
        }
    }

    fn test_server() -> ToolServer {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(
                ToolSpec::new("slow_echo", "Echo a value after a delay"),
                |params: SlowParams, ctx: RequestContext| async move {
                    tokio::time::sleep(Duration::from_millis(params.delay_ms)).await;
                    Ok::<_, ToolError>(SlowOutput {
                        value: params.value,
                        session: ctx.session_id().to_string(),
                    })
                },
            )
            .unwrap();
        registry
            .register_fn(
                ToolSpec::new("greet", "Read the greeting resource"),
                |_: NoParams, ctx: RequestContext| async move {
                    let greeting = ctx.resource::<String>("greeting")?;
                    Ok::<_, ToolError>(Greeting {
                        greeting: greeting.as_str().to_string(),
                    })
                },
            )
            .unwrap();
        registry
            .register_fn(
                ToolSpec::new("explode", "Always panics"),
                |_: NoParams, _ctx: RequestContext| async move {
                    if true {
                        panic!("boom");
                    }
                    Ok::<_, ToolError>(Greeting {
                        greeting: String::new(),
                    })
                },
            )
            .unwrap();

        // Declares an integer output but returns a string.
        let liar: ToolHandler = Arc::new(|_: Value, _: RequestContext| {
            async { Ok::<_, ToolError>(json!({ "count": "many" })) }.boxed()
        });
        registry
            .register(
                Tool::new(
                    ToolSpec::new("liar", "Breaks its output contract"),
                    json!({ "type": "object" }),
                    json!({
                        "type": "object",
                        "properties": { "count": { "type": "integer" } },
                        "required": ["count"]
                    }),
                    liar,
                )
                .unwrap(),
            )
            .unwrap();

        // Panics before it even returns a future.
        let eager_panic: ToolHandler = Arc::new(|_: Value, _: RequestContext| -> ToolFuture {
            panic!("boom before the first await")
        });
        registry
            .register(
                Tool::new(
                    ToolSpec::new("eager_panic", "Panics synchronously"),
                    json!({ "type": "object" }),
                    json!({ "type": "object" }),
                    eager_panic,
                )
                .unwrap(),
            )
            .unwrap();

        ToolServer::new("test", registry, GreetingLifespan)
    }

    async fn invoke(server: &ToolServer, name: &str, input: Value) -> Result<Value, ToolError> {
        server.invoke(name, input, server.context(SessionId::generate())).await
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let server = test_server();
        server.open().await.unwrap();

        let ctx = server.context(SessionId::from("abc"));
        let output = server
            .invoke("slow_echo", json!({ "value": 3, "delay_ms": 0 }), ctx)
            .await
            .unwrap();
        assert_eq!(output, json!({ "value": 3, "session": "abc" }));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let server = test_server();
        let err = invoke(&server, "missing", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::unknown_tool("missing"));
    }

    #[tokio::test]
    async fn test_invoke_invalid_input() {
        let server = test_server();
        let err = invoke(&server, "slow_echo", json!({ "value": "x" })).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidInputError");
    }

    #[tokio::test]
    async fn test_invoke_invalid_output() {
        let server = test_server();
        let err = invoke(&server, "liar", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidOutputError");
    }

    #[tokio::test]
    async fn test_invoke_panic_is_internal_error() {
        let server = test_server();
        let err = invoke(&server, "explode", Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), "InternalError");
    }

    #[tokio::test]
    async fn test_synchronous_panic_is_internal_error() {
        let server = test_server();
        let err = invoke(&server, "eager_panic", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "InternalError");
    }

    #[tokio::test]
    async fn test_invoke_null_input_means_no_arguments() {
        let server = test_server();
        server.open().await.unwrap();
        let output = invoke(&server, "greet", Value::Null).await.unwrap();
        assert_eq!(output, json!({ "greeting": "hello" }));
    }

    #[tokio::test]
    async fn test_stale_resource_after_close() {
        let server = test_server();
        server.open().await.unwrap();
        server.close().await.unwrap();

        let err = invoke(&server, "greet", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "UpstreamCallError");
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_independent() {
        let server = Arc::new(test_server());
        server.open().await.unwrap();

        let slow = {
            let server = server.clone();
            tokio::spawn(async move {
                let ctx = server.context(SessionId::from("slow"));
                server
                    .invoke("slow_echo", json!({ "value": 1, "delay_ms": 100 }), ctx)
                    .await
            })
        };
        let fast = {
            let server = server.clone();
            tokio::spawn(async move {
                let ctx = server.context(SessionId::from("fast"));
                server
                    .invoke("slow_echo", json!({ "value": 2, "delay_ms": 0 }), ctx)
                    .await
            })
        };

        let fast = fast.await.unwrap().unwrap();
        assert!(!slow.is_finished(), "fast call must not wait for the slow one");
        let slow = slow.await.unwrap().unwrap();

        assert_eq!(fast, json!({ "value": 2, "session": "fast" }));
        assert_eq!(slow, json!({ "value": 1, "session": "slow" }));
    }

    #[tokio::test]
    async fn test_close_cancels_in_flight_invocation() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut registry = ToolRegistry::new();
        {
            let finished = finished.clone();
            registry
                .register_fn(
                    ToolSpec::new("hold", "Holds the greeting for a long time"),
                    move |_: NoParams, ctx: RequestContext| {
                        let finished = finished.clone();
                        async move {
                            let greeting = ctx.resource::<String>("greeting")?;
                            tokio::time::sleep(Duration::from_secs(10)).await;
                            finished.store(true, Ordering::SeqCst);
                            Ok::<_, ToolError>(Greeting {
                                greeting: greeting.as_str().to_string(),
                            })
                        }
                    },
                )
                .unwrap();
        }
        let server = Arc::new(ToolServer::new("test", registry, GreetingLifespan));
        server.open().await.unwrap();

        let call = {
            let server = server.clone();
            tokio::spawn(async move { invoke(&server, "hold", json!({})).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), server.close())
            .await
            .expect("close must not wait for the handler to finish")
            .unwrap();
        assert_eq!(server.phase(), ScopePhase::Closed);

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), "UpstreamCallError");
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_list_tools() {
        let server = ToolServer::new("empty", ToolRegistry::new(), NoResources);
        assert!(server.list_tools().is_empty());
        assert_eq!(test_server().list_tools().len(), 5);
    }
}
