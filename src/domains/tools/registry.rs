//! Tool Registry - registration and lookup of a server's tools.
//!
//! This module provides:
//! - The [`Tool`] record (name, schemas, handler)
//! - A registry that rejects duplicate names and validates schemas up front
//! - Tool descriptors for discovery (`tools/list`)

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use jsonschema::Validator;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::ToolError;
use crate::core::context::RequestContext;

/// Boxed future returned by a tool handler.
pub type ToolFuture = BoxFuture<'static, Result<Value, ToolError>>;

/// Type-erased tool handler: validated input plus request context.
pub type ToolHandler = Arc<dyn Fn(Value, RequestContext) -> ToolFuture + Send + Sync>;

/// Errors raised while populating a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// A declared schema could not be compiled.
    #[error("Invalid {which} schema for tool '{tool}': {message}")]
    InvalidSchema {
        tool: String,
        which: &'static str,
        message: String,
    },
}

impl RegistryError {
    /// Stable error kind reported in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateTool(_) => "DuplicateToolError",
            Self::InvalidSchema { .. } => "InvalidSchemaError",
        }
    }
}

/// Static metadata of a tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub title: Option<String>,
    pub description: String,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
        }
    }

    /// Set a human-readable title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Tool metadata advertised to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// A registered tool. Immutable once built.
pub struct Tool {
    spec: ToolSpec,
    input_schema: Value,
    output_schema: Value,
    input_validator: Validator,
    output_validator: Validator,
    handler: ToolHandler,
}

impl Tool {
    /// Build a tool from raw JSON schemas and a type-erased handler.
    pub fn new(
        spec: ToolSpec,
        input_schema: Value,
        output_schema: Value,
        handler: ToolHandler,
    ) -> Result<Self, RegistryError> {
        let input_validator = compile(&spec.name, "input", &input_schema)?;
        let output_validator = compile(&spec.name, "output", &output_schema)?;
        Ok(Self {
            spec,
            input_schema,
            output_schema,
            input_validator,
            output_validator,
            handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &Value {
        &self.output_schema
    }

    /// Check `input` against the input schema.
    pub fn validate_input(&self, input: &Value) -> Result<(), ToolError> {
        validate(&self.input_validator, input)
            .map_err(|msg| ToolError::invalid_input(format!("{}: {}", self.spec.name, msg)))
    }

    /// Check `output` against the output schema.
    pub fn validate_output(&self, output: &Value) -> Result<(), ToolError> {
        validate(&self.output_validator, output)
            .map_err(|msg| ToolError::invalid_output(format!("{}: {}", self.spec.name, msg)))
    }

    /// Run the handler without any validation.
    pub fn call(&self, input: Value, ctx: RequestContext) -> ToolFuture {
        (self.handler)(input, ctx)
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.spec.name.clone(),
            title: self.spec.title.clone(),
            description: self.spec.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.spec.name)
            .field("title", &self.spec.title)
            .finish_non_exhaustive()
    }
}

fn compile(tool: &str, which: &'static str, schema: &Value) -> Result<Validator, RegistryError> {
    jsonschema::validator_for(schema).map_err(|e| RegistryError::InvalidSchema {
        tool: tool.to_string(),
        which,
        message: e.to_string(),
    })
}

fn validate(validator: &Validator, instance: &Value) -> Result<(), String> {
    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|error| format!("{error}"))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

fn schema_of<T: JsonSchema>(tool: &str, which: &'static str) -> Result<Value, RegistryError> {
    serde_json::to_value(schemars::schema_for!(T)).map_err(|e| RegistryError::InvalidSchema {
        tool: tool.to_string(),
        which,
        message: e.to_string(),
    })
}

/// The set of tools exposed by one server.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Fails if the name is taken.
    pub fn register(&mut self, tool: Tool) -> Result<(), RegistryError> {
        if self.tools.contains_key(tool.name()) {
            return Err(RegistryError::DuplicateTool(tool.name().to_string()));
        }
        debug!("Registered tool: {}", tool.name());
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        Ok(())
    }

    /// Register a typed handler.
    ///
    /// Input and output schemas are derived from `I` and `O`. The input is
    /// deserialized into `I` before the handler runs.
    pub fn register_fn<I, O, F, Fut>(
        &mut self,
        spec: ToolSpec,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        O: Serialize + JsonSchema + Send + 'static,
        F: Fn(I, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    {
        let input_schema = schema_of::<I>(&spec.name, "input")?;
        let output_schema = schema_of::<O>(&spec.name, "output")?;

        let erased: ToolHandler = Arc::new(move |input: Value, ctx: RequestContext| {
            match serde_json::from_value::<I>(input) {
                Ok(params) => {
                    let fut = handler(params, ctx);
                    async move {
                        let output = fut.await?;
                        serde_json::to_value(output)
                            .map_err(|e| ToolError::invalid_output(e.to_string()))
                    }
                    .boxed()
                }
                Err(e) => {
                    futures::future::ready(Err::<Value, _>(ToolError::invalid_input(e.to_string())))
                        .boxed()
                }
            }
        });

        self.register(Tool::new(spec, input_schema, output_schema, erased)?)
    }

    /// Find a tool by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::unknown_tool(name))
    }

    /// Descriptors of all tools, sorted by name.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Names of all tools, sorted.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lifespan::{LifespanScope, NoResources};
    use crate::core::context::SessionId;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoParams {
        text: String,
    }

    #[derive(Debug, Serialize, JsonSchema)]
    struct EchoOutput {
        echoed: String,
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(
                ToolSpec::new("echo", "Echo text back").with_title("Echo"),
                |params: EchoParams, _ctx| async move {
                    Ok::<_, ToolError>(EchoOutput { echoed: params.text })
                },
            )
            .unwrap();
        registry
    }

    fn test_context() -> RequestContext {
        let scope = Arc::new(LifespanScope::new("test", NoResources));
        RequestContext::new(SessionId::generate(), Arc::from("test"), scope)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = echo_registry();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("echo").unwrap().name(), "echo");
        assert_eq!(
            registry.lookup("missing").unwrap_err(),
            ToolError::unknown_tool("missing")
        );
    }

    #[test]
    fn test_tool_debug_lists_name() {
        let tool = echo_registry().lookup("echo").unwrap();
        let debug_str = format!("{:?}", tool);
        assert!(debug_str.contains("echo"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = echo_registry();
        let err = registry
            .register_fn(
                ToolSpec::new("echo", "Another echo"),
                |params: EchoParams, _ctx| async move {
                    Ok::<_, ToolError>(EchoOutput { echoed: params.text })
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "DuplicateToolError");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_raw_schema_is_rejected() {
        let handler: ToolHandler = Arc::new(|_: Value, _: RequestContext| {
            futures::future::ready(Ok::<_, ToolError>(json!({}))).boxed()
        });
        let result = Tool::new(
            ToolSpec::new("broken", "Broken schema"),
            json!({ "type": "not-a-type" }),
            json!({}),
            handler,
        );
        assert!(matches!(result, Err(RegistryError::InvalidSchema { which: "input", .. })));
    }

    #[test]
    fn test_list_descriptors() {
        let registry = echo_registry();
        let tools = registry.list();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].title.as_deref(), Some("Echo"));
        assert_eq!(tools[0].input_schema["properties"]["text"]["type"], "string");

        let value = serde_json::to_value(&tools[0]).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert!(value.get("outputSchema").is_some());
    }

    #[test]
    fn test_validate_input() {
        let tool = echo_registry().lookup("echo").unwrap();
        assert!(tool.validate_input(&json!({ "text": "hi" })).is_ok());

        let err = tool.validate_input(&json!({})).unwrap_err();
        assert_eq!(err.kind(), "InvalidInputError");
        let err = tool.validate_input(&json!({ "text": 5 })).unwrap_err();
        assert_eq!(err.kind(), "InvalidInputError");
    }

    #[test]
    fn test_validate_output() {
        let tool = echo_registry().lookup("echo").unwrap();
        assert!(tool.validate_output(&json!({ "echoed": "hi" })).is_ok());
        let err = tool.validate_output(&json!({ "echoed": 1 })).unwrap_err();
        assert_eq!(err.kind(), "InvalidOutputError");
    }

    #[tokio::test]
    async fn test_typed_handler_call() {
        let tool = echo_registry().lookup("echo").unwrap();
        let output = tool.call(json!({ "text": "hi" }), test_context()).await.unwrap();
        assert_eq!(output, json!({ "echoed": "hi" }));

        let err = tool.call(json!({ "nope": 1 }), test_context()).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidInputError");
    }
}
