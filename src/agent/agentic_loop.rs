//! Streaming tool-calling loop.
//!
//! Drives the model ↔ tool round-trip: streams a completion, forwards every
//! event as it arrives, reassembles tool calls, executes them in the order
//! the model gave, appends the results and repeats until the model ends a
//! turn without tool calls or the iteration limit is reached.
//!
//! Forwarded tool-call fragments let the reader tell turns apart.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use super::message::{
    ChatRequest, StreamEvent, ToolCallAccumulator, assistant_tool_calls_message, tool_message,
};
use super::provider::LlmProvider;
use super::tool::ToolSet;
use crate::error::AgentError;

/// Sending half of a response stream.
pub type EventSender = mpsc::Sender<Result<StreamEvent, AgentError>>;

/// Runs the loop, sending stream events to `tx`.
///
/// Returns early (successfully) if the receiving side is dropped.
///
/// # Errors
///
/// Returns [`AgentError::ToolLoopExceeded`] if the model keeps requesting
/// tools beyond `max_iterations`. Propagates provider and stream errors,
/// including model failures inside retrieval tools.
pub async fn streaming_tool_loop(
    provider: &dyn LlmProvider,
    tools: &ToolSet,
    request: &mut ChatRequest,
    max_iterations: usize,
    tx: &EventSender,
) -> Result<(), AgentError> {
    for iteration in 0..max_iterations {
        let mut stream = provider.chat_stream(request).await?;
        let mut text = String::new();
        let mut calls = ToolCallAccumulator::new();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Text(fragment) if fragment.is_empty() => {}
                StreamEvent::Text(fragment) => {
                    text.push_str(&fragment);
                    if tx.send(Ok(StreamEvent::Text(fragment))).await.is_err() {
                        debug!(iteration, "response stream closed, stopping agent");
                        return Ok(());
                    }
                }
                StreamEvent::ToolCall(delta) => {
                    calls.push(delta.clone());
                    if tx.send(Ok(StreamEvent::ToolCall(delta))).await.is_err() {
                        debug!(iteration, "response stream closed, stopping agent");
                        return Ok(());
                    }
                }
            }
        }

        if calls.is_empty() {
            debug!(iteration, "agent finished with a text turn");
            return Ok(());
        }

        let calls = calls.finish();
        debug!(iteration, tool_count = calls.len(), "executing tool calls");
        request
            .messages
            .push(assistant_tool_calls_message(text, calls.clone()));

        for call in &calls {
            let result = tools.execute(call).await?;
            debug!(
                tool = call.name,
                call_id = call.id,
                is_error = result.is_error,
                "tool execution complete"
            );
            request
                .messages
                .push(tool_message(&result.tool_call_id, &result.content));
        }
    }

    Err(AgentError::ToolLoopExceeded { max_iterations })
}
