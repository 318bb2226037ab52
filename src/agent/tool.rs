//! Tool abstraction and registry for function-calling.
//!
//! A [`Tool`] is a named, described capability with a JSON Schema for its
//! arguments. [`ToolSet`] holds the registered tools, hands their
//! [`ToolDefinition`]s to the model, and dispatches the [`ToolCall`]s the
//! model makes. Dispatch never fails: every error becomes a [`ToolResult`]
//! with `is_error` set so the model can see it and adapt.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AgentError, ToolError};
use crate::query::QueryEngine;

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must be unique within a [`ToolSet`]).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (JSON string on success, error message on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// What a tool wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Retrieval-augmented query against one index.
    Retrieval,
    /// Pure function (arithmetic).
    Function,
    /// Lookup against an external (here: stubbed) source.
    Lookup,
}

/// A capability the agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name exposed to the model.
    fn name(&self) -> &str;

    /// Description exposed to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn parameters(&self) -> serde_json::Value;

    /// What the tool wraps.
    fn kind(&self) -> ToolKind;

    /// Runs the tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] on bad arguments or when the operation fails.
    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// The query engine behind a retrieval tool, if this is one.
    fn query_engine(&self) -> Option<Arc<QueryEngine>> {
        None
    }

    /// Builds the definition sent to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Decodes a tool's arguments object into a typed struct.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] naming the tool.
pub fn parse_args<T: serde::de::DeserializeOwned>(
    name: &str,
    args: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// The registered tools for one pipeline.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}

impl ToolSet {
    /// Registers `tools`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if two tools share a name.
    pub fn register(tools: Vec<Arc<dyn Tool>>) -> Result<Self, ToolError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name().to_string()) {
                return Err(ToolError::DuplicateTool {
                    name: tool.name().to_string(),
                });
            }
        }
        Ok(Self { tools })
    }

    /// Empty tool set (no tools available).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns the definitions of every tool, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Looks a tool up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Iterates over the registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Dispatches a tool call.
    ///
    /// Validates raw argument size before decoding. Tool failures are folded
    /// into an error [`ToolResult`] for the model to see.
    ///
    /// # Errors
    ///
    /// Returns the [`AgentError`] behind a [`ToolError::Upstream`] failure.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, AgentError> {
        match self.try_execute(call).await {
            Ok(value) => {
                let content = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                debug!(tool = call.name, call_id = call.id, "tool call succeeded");
                Ok(ToolResult {
                    tool_call_id: call.id.clone(),
                    content,
                    is_error: false,
                })
            }
            Err(ToolError::Upstream { name, source }) => {
                warn!(tool = name, call_id = call.id, error = %source, "tool lost the model");
                Err(source)
            }
            Err(e) => {
                warn!(tool = call.name, call_id = call.id, error = %e, "tool call failed");
                Ok(ToolResult {
                    tool_call_id: call.id.clone(),
                    content: format!("Error: {e}"),
                    is_error: true,
                })
            }
        }
    }

    async fn try_execute(&self, call: &ToolCall) -> Result<serde_json::Value, ToolError> {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return Err(ToolError::InvalidArguments {
                name: call.name.clone(),
                message: format!(
                    "arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
            });
        }

        let tool = self.get(&call.name).ok_or_else(|| ToolError::UnknownTool {
            name: call.name.clone(),
        })?;

        // Some models send an empty string for tools without parameters.
        let args = if call.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| ToolError::InvalidArguments {
                name: call.name.clone(),
                message: e.to_string(),
            })?
        };

        tool.invoke(args).await
    }
}
