//! Mount table: path prefix → tool server.

use std::sync::Arc;

use super::GatewayError;
use crate::core::server::ToolServer;

/// One mounted server.
#[derive(Debug, Clone)]
pub struct Mount {
    prefix: String,
    server: Arc<ToolServer>,
}

impl Mount {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn server(&self) -> &Arc<ToolServer> {
        &self.server
    }
}

/// Mounted servers in mount order.
///
/// Startup opens scopes in this order and shutdown closes them in reverse.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `server` under `prefix` (`docs` and `/docs` are equivalent).
    pub fn insert(&mut self, prefix: &str, server: Arc<ToolServer>) -> Result<(), GatewayError> {
        let prefix = normalize_prefix(prefix)?;
        if self.get(&prefix).is_some() {
            return Err(GatewayError::DuplicateMount(prefix));
        }
        self.mounts.push(Mount { prefix, server });
        Ok(())
    }

    /// Find the mount for an exact prefix.
    pub fn get(&self, prefix: &str) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.prefix == prefix)
    }

    /// Find the mount serving `path`, e.g. `/docs/tools` → the `/docs` mount.
    pub fn resolve(&self, path: &str) -> Result<&Mount, GatewayError> {
        let segment = path
            .strip_prefix('/')
            .and_then(|rest| rest.split('/').next())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::not_found(path))?;

        self.mounts
            .iter()
            .find(|m| &m.prefix[1..] == segment)
            .ok_or_else(|| GatewayError::not_found(path))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mount> {
        self.mounts.iter()
    }

    pub fn prefixes(&self) -> Vec<&str> {
        self.mounts.iter().map(|m| m.prefix.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

fn normalize_prefix(raw: &str) -> Result<String, GatewayError> {
    let trimmed = raw.trim();
    let segment = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(format!("/{segment}"))
    } else {
        Err(GatewayError::InvalidPrefix(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lifespan::NoResources;
    use crate::domains::tools::ToolRegistry;

    fn server(id: &str) -> Arc<ToolServer> {
        Arc::new(ToolServer::new(id, ToolRegistry::new(), NoResources))
    }

    #[test]
    fn test_insert_normalizes_prefix() {
        let mut table = MountTable::new();
        table.insert("docs", server("docs")).unwrap();
        table.insert("/email", server("email")).unwrap();
        assert_eq!(table.prefixes(), vec!["/docs", "/email"]);
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let mut table = MountTable::new();
        table.insert("/docs", server("docs")).unwrap();
        let err = table.insert("docs", server("other")).unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateMount(p) if p == "/docs"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_invalid_prefixes_rejected() {
        let mut table = MountTable::new();
        for bad in ["", "/", "/a/b", "/sp ace", "/{x}"] {
            let err = table.insert(bad, server("x")).unwrap_err();
            assert_eq!(err.kind(), "InvalidMountError", "prefix {:?}", bad);
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_resolve() {
        let mut table = MountTable::new();
        table.insert("/docs", server("docs")).unwrap();
        table.insert("/email", server("email")).unwrap();

        assert_eq!(table.resolve("/docs/tools/fetch_documentation").unwrap().server().id(), "docs");
        assert_eq!(table.resolve("/email").unwrap().server().id(), "email");
        assert_eq!(table.resolve("/emailx/tools").unwrap_err().kind(), "NotFoundError");
        assert_eq!(table.resolve("/").unwrap_err().kind(), "NotFoundError");
        assert_eq!(table.resolve("docs").unwrap_err().kind(), "NotFoundError");
    }
}
