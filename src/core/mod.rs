//! Core infrastructure: configuration, errors, lifespan scopes, request
//! context, the tool server, the gateway and its transports.

pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod lifespan;
pub mod server;
pub mod transport;

pub use config::Config;
pub use context::{RequestContext, SessionId};
pub use error::{Error, Result};
pub use gateway::{Gateway, GatewayError, GatewayState};
pub use lifespan::{Lifespan, LifespanError, LifespanScope, Resources, ScopePhase};
pub use server::ToolServer;
pub use transport::{TransportConfig, TransportService};
