//! Per-invocation request context.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::lifespan::LifespanScope;
use crate::domains::tools::ToolError;

/// Identifier of the client session an invocation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context handed to every tool handler.
///
/// Created for one invocation and dropped when it completes. Handlers use it
/// to reach the owning server's lifespan resources; they must not keep it,
/// or any handle obtained from it, past the call.
#[derive(Clone)]
pub struct RequestContext {
    session_id: SessionId,
    server_id: Arc<str>,
    scope: Arc<LifespanScope>,
}

impl RequestContext {
    pub fn new(session_id: SessionId, server_id: Arc<str>, scope: Arc<LifespanScope>) -> Self {
        Self {
            session_id,
            server_id,
            scope,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Fetch a lifespan resource by name and type.
    ///
    /// Fails with [`ToolError::Upstream`] once the scope is no longer open,
    /// so a handler racing shutdown gets an error instead of a stale handle.
    pub fn resource<T>(&self, name: &str) -> Result<Arc<T>, ToolError>
    where
        T: Any + Send + Sync,
    {
        let resources = self.scope.resources().ok_or_else(|| {
            ToolError::upstream(format!(
                "resource '{}' unavailable: lifespan scope of '{}' is {:?}",
                name,
                self.server_id,
                self.scope.phase()
            ))
        })?;

        resources.get::<T>(name).ok_or_else(|| {
            ToolError::internal(format!(
                "resource '{}' of type {} is not provided by '{}'",
                name,
                std::any::type_name::<T>(),
                self.server_id
            ))
        })
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("session_id", &self.session_id)
            .field("server_id", &self.server_id)
            .finish()
    }
}
