//! Tools domain module.
//!
//! ## Architecture
//!
//! - `registry.rs` - Tool records, schema validation and the per-server registry
//! - `error.rs` - Invocation error taxonomy
//! - `definitions/` - Concrete tools, grouped by the server exposing them
//!
//! ## Adding a New Tool
//!
//! 1. Define a params struct (`Deserialize + JsonSchema`) and an output type
//!    (`Serialize + JsonSchema`) in `definitions/`
//! 2. Write an async `execute(params, ctx)` returning `Result<_, ToolError>`
//! 3. Call `registry.register_fn(...)` from the tool's `register()`
//! 4. Add the `register()` call to the server in `domains/servers.rs`

pub mod definitions;
mod error;
mod registry;

pub use error::ToolError;
pub use registry::{
    RegistryError, Tool, ToolDescriptor, ToolFuture, ToolHandler, ToolRegistry, ToolSpec,
};
