//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::stream;

use super::message::{
    ChatRequest, ChatResponse, EventStream, StreamEvent, TokenUsage, ToolCallAccumulator,
    ToolCallDelta,
};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Replays one scripted assistant turn per request, streaming or not,
/// and records every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Vec<StreamEvent>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_turn(&self, request: &ChatRequest) -> Result<Vec<StreamEvent>, AgentError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| AgentError::ApiRequest {
                message: "script exhausted".to_string(),
                status: None,
            })
    }
}

/// A text-only turn.
pub fn text(content: &str) -> Vec<StreamEvent> {
    vec![StreamEvent::Text(content.to_string())]
}

/// A turn calling one tool, with the arguments split across two fragments.
pub fn call(index: u32, name: &str, arguments: &str) -> Vec<StreamEvent> {
    let (head, tail) = arguments.split_at(arguments.len() / 2);
    vec![
        StreamEvent::ToolCall(ToolCallDelta {
            index,
            id: Some(format!("call_{name}_{index}")),
            name: Some(name.to_string()),
            arguments: Some(head.to_string()),
        }),
        StreamEvent::ToolCall(ToolCallDelta {
            index,
            arguments: Some(tail.to_string()),
            ..ToolCallDelta::default()
        }),
    ]
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let mut content = String::new();
        let mut calls = ToolCallAccumulator::new();
        for event in self.next_turn(request)? {
            match event {
                StreamEvent::Text(t) => content.push_str(&t),
                StreamEvent::ToolCall(delta) => calls.push(delta),
            }
        }
        Ok(ChatResponse {
            content,
            usage: TokenUsage::default(),
            tool_calls: calls.finish(),
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<EventStream, AgentError> {
        let events = self.next_turn(request)?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
