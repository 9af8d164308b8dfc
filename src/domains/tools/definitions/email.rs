//! Email tools backed by a mocked store.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, instrument};

use super::common::{NoParams, Record};
use crate::core::context::RequestContext;
use crate::domains::tools::{RegistryError, ToolError, ToolRegistry, ToolSpec};

/// Returns the stored emails.
pub struct GetEmailsTool;

impl GetEmailsTool {
    pub const NAME: &'static str = "get_emails";

    pub const DESCRIPTION: &'static str = "Returns email data from a database.";

    pub async fn execute(_params: NoParams, _ctx: RequestContext) -> Result<Record, ToolError> {
        Ok(Record::mocked(
            "Emails",
            "This is a mocked email entry from the database.",
        ))
    }

    pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
        registry.register_fn(ToolSpec::new(Self::NAME, Self::DESCRIPTION), Self::execute)
    }
}

/// Parameters for the write email tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteEmailParams {
    /// Email subject line.
    pub subject: String,

    /// Email body.
    pub body: String,
}

/// Writes an email to the store.
pub struct WriteEmailTool;

impl WriteEmailTool {
    pub const NAME: &'static str = "write_email";

    pub const DESCRIPTION: &'static str = "Writes an email to a database.";

    #[instrument(skip_all, fields(session = %ctx.session_id()))]
    pub async fn execute(
        params: WriteEmailParams,
        ctx: RequestContext,
    ) -> Result<Record, ToolError> {
        info!("Writing email '{}'", params.subject);
        Ok(Record::mocked(
            "Email Written",
            format!(
                "Email with subject '{}' and body '{}' has been written to the database.",
                params.subject, params.body
            ),
        ))
    }

    pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
        registry.register_fn(ToolSpec::new(Self::NAME, Self::DESCRIPTION), Self::execute)
    }
}
