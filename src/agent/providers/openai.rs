//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`AgentConfig`].

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionStreamResponse,
    FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;

use crate::agent::config::AgentConfig;
use crate::agent::message::{
    ChatMessage, ChatRequest, ChatResponse, EventStream, Role, StreamEvent, TokenUsage,
    ToolCallDelta,
};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::ToolCall;
use crate::error::AgentError;

/// Backoff policy that gives up after the first failure.
fn no_retry() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// `OpenAI`-compatible LLM provider.
///
/// Wraps the `async-openai` client for chat completions. Compatible
/// with any API that follows the `OpenAI` chat completions API.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a new provider from agent configuration.
    ///
    /// The client never retries: a failed request surfaces immediately.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry()),
        }
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                let content = if msg.content.is_empty() {
                    None
                } else {
                    Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    ))
                };

                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content,
                    name: None,
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
            Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(msg.content.clone()),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }),
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|td| ChatCompletionTool {
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionObject {
                            name: td.name.clone(),
                            description: Some(td.description.clone()),
                            parameters: Some(td.parameters.clone()),
                            strict: None,
                        },
                    })
                    .collect(),
            )
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            stream: if request.stream { Some(true) } else { None },
            tools,
            ..Default::default()
        }
    }

    /// Splits one streamed chunk into text and tool-call events.
    fn convert_chunk(
        result: Result<CreateChatCompletionStreamResponse, OpenAIError>,
    ) -> Vec<Result<StreamEvent, AgentError>> {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return vec![Err(AgentError::Stream {
                    message: e.to_string(),
                })];
            }
        };

        let Some(choice) = response.choices.into_iter().next() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if let Some(text) = choice.delta.content
            && !text.is_empty()
        {
            events.push(Ok(StreamEvent::Text(text)));
        }
        for chunk in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = chunk
                .function
                .map_or((None, None), |f| (f.name, f.arguments));
            events.push(Ok(StreamEvent::ToolCall(ToolCallDelta {
                index: chunk.index,
                id: chunk.id,
                name,
                arguments,
            })));
        }
        events
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
                status: None,
            })?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            tool_calls,
            finish_reason,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<EventStream, AgentError> {
        let mut stream_request = request.clone();
        stream_request.stream = true;
        let openai_request = Self::build_request(&stream_request);

        let chunks = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
                status: None,
            })?;

        let events = chunks.flat_map(|result| stream::iter(Self::convert_chunk(result)));

        Ok(Box::pin(events))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::tool::ToolDefinition;

    fn request(stream: bool, tools: Vec<ToolDefinition>) -> ChatRequest {
        ChatRequest {
            model: "gpt-4-1106-preview".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.2),
            max_tokens: Some(100),
            stream,
            tools,
        }
    }

    #[test]
    fn test_client_does_not_retry() {
        use backoff::backoff::Backoff;

        let mut policy = no_retry();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(policy.next_backoff(), None);
    }

    #[test]
    fn test_convert_system_message() {
        let msg = message::system_message("test");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_tool_message() {
        let msg = message::tool_message("call_123", "42");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let msg = message::assistant_tool_calls_message(
            String::new(),
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "multiply".to_string(),
                arguments: r#"{"a":7,"b":6}"#.to_string(),
            }],
        );
        let converted = OpenAiProvider::convert_message(&msg);
        if let ChatCompletionRequestMessage::Assistant(a) = converted {
            assert_eq!(a.tool_calls.as_ref().map_or(0, Vec::len), 1);
            assert!(a.content.is_none());
        } else {
            panic!("Expected Assistant message");
        }
    }

    #[test]
    fn test_build_request_keeps_temperature() {
        let built = OpenAiProvider::build_request(&request(false, Vec::new()));
        assert_eq!(built.temperature, Some(0.2));
        assert!(built.tools.is_none());
        assert!(built.stream.is_none());
    }

    #[test]
    fn test_build_request_streaming_with_tools() {
        let built = OpenAiProvider::build_request(&request(
            true,
            vec![ToolDefinition {
                name: "add".to_string(),
                description: "Adds two integers".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
        ));
        assert_eq!(built.stream, Some(true));
        assert_eq!(built.tools.as_ref().map_or(0, Vec::len), 1);
    }
}
