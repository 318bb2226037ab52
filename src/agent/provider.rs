//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. The router and agent loop only ever see
//! this trait, which is also the seam tests use to script model behaviour.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, EventStream};
use crate::error::AgentError;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer for a specific provider while
/// presenting a uniform interface. They must not retry failed requests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] on API failures.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Executes a streaming chat completion request.
    ///
    /// Returns text and tool-call fragments as they arrive from the provider.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection failures; mid-stream failures
    /// arrive as `Err` items of [`AgentError::Stream`].
    async fn chat_stream(&self, request: &ChatRequest) -> Result<EventStream, AgentError>;
}
