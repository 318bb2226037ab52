//! Language-model side of paperchat.
//!
//! Provides the provider abstraction (backed by OpenAI-compatible APIs),
//! configuration, prompt templates, the tool registry and the streaming
//! tool-calling loop used by the agent route.
//!
//! # Architecture
//!
//! ```text
//! QueryRouter
//!   ├── SingleIndex → QueryEngine → LlmProvider (QA, refine, stream)
//!   └── MultiToolAgent → streaming_tool_loop
//!         ├── LlmProvider::chat_stream (text → response stream)
//!         └── ToolSet::execute (tool results → next turn)
//! ```

pub mod agentic_loop;
pub mod client;
pub mod config;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod tool;

#[cfg(test)]
pub(crate) mod mock;

// Re-export key types
pub use client::create_provider;
pub use config::AgentConfig;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, StreamEvent, TokenUsage};
pub use prompt::{PromptSet, TemplateStyle};
pub use provider::LlmProvider;
pub use tool::{Tool, ToolCall, ToolDefinition, ToolKind, ToolResult, ToolSet};
