//! MCP Gateway Library
//!
//! Hosts several MCP tool servers in one process, each mounted under its own
//! path prefix and each owning a lifespan-scoped set of shared resources.
//!
//! # Architecture
//!
//! - **core**: configuration, errors, lifespan scopes, request context, the
//!   tool server, the gateway and its transports
//! - **domains**: business logic
//!   - **tools**: tool registry and concrete tool definitions
//!   - **servers**: catalog assembling tools into servers
//!
//! # Example
//!
//! ```rust,no_run
//! use mcp_gateway::core::{Config, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     TransportService::new(config).run().await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

pub use self::core::{Config, Error, Gateway, Result, ToolServer};
