//! Tool definitions module.
//!
//! One file per server's tool set. Each tool is a unit struct with `NAME`,
//! `DESCRIPTION`, an async `execute()` and a `register()` hook.

pub mod common;
pub mod docs;
pub mod email;
pub mod news;

pub use common::{MOCKED_SOURCE, NoParams, Record};
pub use docs::{FetchDocumentationParams, FetchDocumentationTool, GetDocumentationFromDatabaseTool};
pub use email::{GetEmailsTool, WriteEmailParams, WriteEmailTool};
pub use news::{
    Article, NewsClient, NewsLifespan, SearchParams, SearchResult, SearchTool, TopHeadlinesParams,
    TopHeadlinesTool,
};
