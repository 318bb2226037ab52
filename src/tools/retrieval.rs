//! Retrieval tools: a [`QueryEngine`] exposed to the agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::agent::tool::{Tool, ToolKind, parse_args};
use crate::error::ToolError;
use crate::query::QueryEngine;

/// Description given to corpora wired from the command line.
#[must_use]
pub fn generic_description(title: &str) -> String {
    format!(
        "Provides information from the '{title}' documents. \
         Use a detailed plain text question as input to the tool."
    )
}

/// Tool name for a corpus title.
#[must_use]
pub fn tool_name(title: &str) -> String {
    format!("{title}_paper")
}

/// A query engine wrapped as a tool taking `{"input": "<question>"}`.
#[derive(Debug)]
pub struct QueryEngineTool {
    name: String,
    description: String,
    engine: Arc<QueryEngine>,
}

#[derive(Deserialize)]
struct Args {
    input: String,
}

impl QueryEngineTool {
    /// Wraps `engine` under `name`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        engine: Arc<QueryEngine>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            engine,
        }
    }
}

#[async_trait]
impl Tool for QueryEngineTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "A detailed plain text question."
                }
            },
            "required": ["input"],
            "additionalProperties": false
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Retrieval
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let Args { input } = parse_args(&self.name, args)?;
        let answer = self
            .engine
            .answer(&input)
            .await
            .map_err(|source| ToolError::Upstream {
                name: self.name.clone(),
                source,
            })?;
        Ok(serde_json::Value::String(answer))
    }

    fn query_engine(&self) -> Option<Arc<QueryEngine>> {
        Some(Arc::clone(&self.engine))
    }
}
