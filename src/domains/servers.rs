//! Server catalog.
//!
//! Builds the tool servers known to this binary by id:
//!
//! | id      | tools                                                  | resources                 |
//! |---------|--------------------------------------------------------|---------------------------|
//! | `docs`  | `fetch_documentation`, `get_documentation_from_database` | none                    |
//! | `email` | `get_emails`, `write_email`                            | none                      |
//! | `news`  | `search`, `top_headlines`                              | `http_client`, `api_key`  |

use crate::core::config::{Config, NewsConfig};
use crate::core::lifespan::NoResources;
use crate::core::server::ToolServer;
use crate::core::{Error, Result};
use crate::domains::tools::ToolRegistry;
use crate::domains::tools::definitions::{
    FetchDocumentationTool, GetDocumentationFromDatabaseTool, GetEmailsTool, NewsLifespan,
    SearchTool, TopHeadlinesTool, WriteEmailTool,
};

/// Ids accepted by [`build`].
pub const SERVER_IDS: &[&str] = &["docs", "email", "news"];

/// Build the server named `id`.
pub fn build(id: &str, config: &Config) -> Result<ToolServer> {
    match id {
        "docs" => docs_server(),
        "email" => email_server(),
        "news" => news_server(&config.news),
        other => Err(Error::config(format!(
            "unknown server '{}' (expected one of: {})",
            other,
            SERVER_IDS.join(", ")
        ))),
    }
}

pub fn docs_server() -> Result<ToolServer> {
    let mut registry = ToolRegistry::new();
    FetchDocumentationTool::register(&mut registry)?;
    GetDocumentationFromDatabaseTool::register(&mut registry)?;
    Ok(ToolServer::new("docs", registry, NoResources)
        .with_instructions("Documentation lookup. Use fetch_documentation for a specific topic."))
}

pub fn email_server() -> Result<ToolServer> {
    let mut registry = ToolRegistry::new();
    GetEmailsTool::register(&mut registry)?;
    WriteEmailTool::register(&mut registry)?;
    Ok(ToolServer::new("email", registry, NoResources)
        .with_instructions("Read and write emails."))
}

pub fn news_server(config: &NewsConfig) -> Result<ToolServer> {
    let mut registry = ToolRegistry::new();
    SearchTool::register(&mut registry)?;
    TopHeadlinesTool::register(&mut registry)?;
    Ok(
        ToolServer::new("news", registry, NewsLifespan::new(config.clone()))
            .with_instructions("Search news articles and top headlines from GNews."),
    )
}
