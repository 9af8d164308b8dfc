//! Transport layer.
//!
//! - **HTTP**: the gateway, every configured server under its own prefix
//! - **STDIO**: a single server over standard input/output - feature: `stdio`

mod config;
mod error;
mod service;
mod session;

pub mod http;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::{HttpConfig, TransportConfig};
pub use error::{TransportError, TransportResult};
pub use service::TransportService;
pub use session::SessionTable;

#[cfg(feature = "stdio")]
pub use config::StdioConfig;
