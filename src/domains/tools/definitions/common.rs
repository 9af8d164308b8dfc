//! Shared types for the record-style tools (docs, email).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Source tag of records served from the mocked store.
pub const MOCKED_SOURCE: &str = "mocked_database";

/// A record returned by the docs and email tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Record {
    pub title: String,
    pub body: String,
    pub source: String,
    /// The topic that was requested, when the tool takes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Record {
    /// A record from the mocked store.
    pub fn mocked(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            source: MOCKED_SOURCE.to_string(),
            topic: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// Input of tools that take no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoParams {}
