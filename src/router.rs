//! Query routing.
//!
//! The wired [`ToolSet`] decides how a query is answered:
//!
//! - a single retrieval tool is queried directly
//!   ([`RouteMode::SingleIndex`]);
//! - anything else goes to the tool-calling agent
//!   ([`RouteMode::MultiToolAgent`]), which lets the model pick tools.
//!
//! Either way the caller gets a [`ResponseStream`] of text fragments.

use std::io::Write;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::agent::agentic_loop::streaming_tool_loop;
use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatRequest, EventStream, StreamEvent, system_message, user_message};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::{ToolKind, ToolSet};
use crate::error::{AgentError, ConfigError, Error};
use crate::query::QueryEngine;

/// Buffered text fragments between the agent task and the reader.
const TOKEN_CHANNEL_CAPACITY: usize = 256;

/// How a query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    /// Mode A: retrieval-augmented answer from one index.
    SingleIndex,
    /// Mode B: tool-calling agent over every wired tool.
    MultiToolAgent,
}

impl RouteMode {
    /// Selects the mode for `tools`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyToolSet`] when no tool is wired.
    pub fn select(tools: &ToolSet) -> Result<Self, ConfigError> {
        let mut iter = tools.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Err(ConfigError::EmptyToolSet),
            (Some(only), None) if only.kind() == ToolKind::Retrieval => Ok(Self::SingleIndex),
            _ => Ok(Self::MultiToolAgent),
        }
    }
}

/// Streamed answer to one query.
pub struct ResponseStream {
    inner: EventStream,
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream").finish_non_exhaustive()
    }
}

impl ResponseStream {
    /// Wraps a provider event stream. Tool-call fragments mark turn
    /// boundaries and are never written out.
    #[must_use]
    pub fn new(inner: EventStream) -> Self {
        Self { inner }
    }

    /// Wraps a channel fed by a background task.
    #[must_use]
    pub fn from_receiver(rx: mpsc::Receiver<Result<StreamEvent, AgentError>>) -> Self {
        Self::new(Box::pin(ReceiverStream::new(rx)))
    }

    /// Returns the next non-empty text fragment, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Returns the upstream [`AgentError`] that ended the stream.
    pub async fn next_token(&mut self) -> Option<Result<String, AgentError>> {
        while let Some(event) = self.inner.next().await {
            match event {
                Ok(StreamEvent::Text(text)) if !text.is_empty() => return Some(Ok(text)),
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    /// Writes every fragment to `out` as it arrives and returns the text of
    /// the final turn, i.e. everything after the last tool call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Agent`] on an upstream failure and a command I/O
    /// error if `out` cannot be written.
    pub async fn drain_into<W: Write>(mut self, out: &mut W) -> Result<String, Error> {
        let mut last_turn = String::new();
        while let Some(event) = self.inner.next().await {
            match event? {
                StreamEvent::Text(token) => {
                    out.write_all(token.as_bytes())
                        .and_then(|()| out.flush())
                        .map_err(crate::error::CommandError::Io)?;
                    last_turn.push_str(&token);
                }
                StreamEvent::ToolCall(_) => last_turn.clear(),
            }
        }
        Ok(last_turn)
    }
}

/// Dispatches queries according to the wired tools.
pub struct QueryRouter {
    mode: RouteMode,
    tools: Arc<ToolSet>,
    provider: Arc<dyn LlmProvider>,
    agent_system: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_tool_iterations: usize,
}

impl std::fmt::Debug for QueryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRouter")
            .field("mode", &self.mode)
            .field("tools", &self.tools)
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

impl QueryRouter {
    /// Creates a router over `tools`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyToolSet`] when `tools` is empty.
    pub fn new(
        tools: ToolSet,
        provider: Arc<dyn LlmProvider>,
        agent_system: impl Into<String>,
        config: &AgentConfig,
    ) -> Result<Self, ConfigError> {
        let mode = RouteMode::select(&tools)?;
        info!(?mode, tools = tools.len(), "query router ready");
        Ok(Self {
            mode,
            tools: Arc::new(tools),
            provider,
            agent_system: agent_system.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_tool_iterations: config.max_tool_iterations,
        })
    }

    /// Selected mode.
    #[must_use]
    pub const fn mode(&self) -> RouteMode {
        self.mode
    }

    /// Starts answering `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the first model call cannot be made. In
    /// agent mode later failures arrive through the stream.
    pub async fn route(&self, query: &str) -> Result<ResponseStream, AgentError> {
        match self.mode {
            RouteMode::SingleIndex => {
                let engine = self.single_engine()?;
                debug!(title = engine.title(), "routing to single index");
                Ok(ResponseStream::new(engine.answer_stream(query).await?))
            }
            RouteMode::MultiToolAgent => Ok(self.spawn_agent(query)),
        }
    }

    fn single_engine(&self) -> Result<Arc<QueryEngine>, AgentError> {
        self.tools
            .iter()
            .find_map(|tool| tool.query_engine())
            .ok_or_else(|| AgentError::Stream {
                message: "retrieval tool has no query engine".to_string(),
            })
    }

    fn spawn_agent(&self, query: &str) -> ResponseStream {
        let mut request = ChatRequest {
            model: self.model.clone(),
            messages: vec![system_message(&self.agent_system), user_message(query)],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            stream: true,
            tools: self.tools.definitions(),
        };
        let provider = Arc::clone(&self.provider);
        let tools = Arc::clone(&self.tools);
        let max_iterations = self.max_tool_iterations;
        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);

        debug!(tools = tools.len(), "routing to tool-calling agent");
        tokio::spawn(async move {
            let outcome =
                streaming_tool_loop(provider.as_ref(), &tools, &mut request, max_iterations, &tx)
                    .await;
            if let Err(e) = outcome {
                // The reader may already be gone; nothing else to report to.
                let _ = tx.send(Err(e)).await;
            }
        });

        ResponseStream::from_receiver(rx)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::ChatResponse;
    use crate::agent::mock::{ScriptedProvider, call, text};
    use crate::agent::prompt::{PromptSet, TemplateStyle};
    use crate::index::{Document, IndexHandle};
    use crate::tools::retrieval::QueryEngineTool;
    use crate::tools::{WeatherTool, math_tools};

    fn config() -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn paper_tool(name: &str, provider: Arc<dyn LlmProvider>) -> Arc<QueryEngineTool> {
        let docs = vec![Document {
            source: "p.txt".to_string(),
            text: "Mixtral uses sparse experts.".to_string(),
        }];
        let engine = QueryEngine::new(
            Arc::new(IndexHandle::build(name, &docs, 512)),
            provider,
            Arc::new(PromptSet::defaults(TemplateStyle::MathCode)),
            &config(),
        );
        Arc::new(QueryEngineTool::new(name, "paper", Arc::new(engine)))
    }

    fn router(tools: ToolSet, provider: Arc<ScriptedProvider>) -> QueryRouter {
        QueryRouter::new(tools, provider, "agent", &config()).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_select_modes() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::default());

        let one_paper = ToolSet::register(vec![paper_tool("a", Arc::clone(&provider))])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(RouteMode::select(&one_paper).ok(), Some(RouteMode::SingleIndex));

        let two_papers = ToolSet::register(vec![
            paper_tool("a", Arc::clone(&provider)),
            paper_tool("b", Arc::clone(&provider)),
        ])
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(RouteMode::select(&two_papers).ok(), Some(RouteMode::MultiToolAgent));

        let one_function =
            ToolSet::register(vec![Arc::new(WeatherTool)]).unwrap_or_else(|_| unreachable!());
        assert_eq!(RouteMode::select(&one_function).ok(), Some(RouteMode::MultiToolAgent));

        assert!(matches!(
            RouteMode::select(&ToolSet::none()),
            Err(ConfigError::EmptyToolSet)
        ));
    }

    #[tokio::test]
    async fn test_single_index_streams_engine_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![text("Sparse experts.")]));
        let tools = ToolSet::register(vec![paper_tool("mixtral", provider.clone())])
            .unwrap_or_else(|_| unreachable!());
        let router = router(tools, Arc::clone(&provider));
        assert_eq!(router.mode(), RouteMode::SingleIndex);

        let stream = router.route("What does Mixtral use?").await.unwrap_or_else(|_| unreachable!());
        let mut out = Vec::new();
        let text = stream.drain_into(&mut out).await.unwrap_or_else(|_| unreachable!());
        assert_eq!(text, "Sparse experts.");
        assert_eq!(out, b"Sparse experts.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_agent_multiplies_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            call(0, "multiply", r#"{"a":7,"b":6}"#),
            text("7 * 6 is 42."),
        ]));
        let tools = ToolSet::register(math_tools()).unwrap_or_else(|_| unreachable!());
        let router = router(tools, Arc::clone(&provider));
        assert_eq!(router.mode(), RouteMode::MultiToolAgent);

        let mut stream = router.route("What is 7 * 6?").await.unwrap_or_else(|_| unreachable!());
        let mut answer = String::new();
        while let Some(token) = stream.next_token().await {
            answer.push_str(&token.unwrap_or_else(|e| panic!("stream error: {e}")));
        }
        assert!(answer.contains("42"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 6);
        assert_eq!(requests[0].messages[0].content, "agent");
        let calls: Vec<_> = requests
            .iter()
            .flat_map(|r| r.messages.iter())
            .flat_map(|m| m.tool_calls.iter())
            .collect();
        // The second request carries the history of the first tool turn only.
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "multiply");
        assert_eq!(calls[0].arguments, r#"{"a":7,"b":6}"#);
    }

    #[tokio::test]
    async fn test_agent_upstream_error_reaches_reader() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let tools = ToolSet::register(math_tools()).unwrap_or_else(|_| unreachable!());
        let router = router(tools, provider);

        let stream = router.route("What is 7 * 6?").await.unwrap_or_else(|_| unreachable!());
        let mut out = Vec::new();
        let result = stream.drain_into(&mut out).await;
        assert!(matches!(result, Err(Error::Agent(AgentError::ApiRequest { .. }))));
        assert!(out.is_empty());
    }

    /// Streams scripted turns but fails every non-streaming completion.
    struct CompletionsDown(ScriptedProvider);

    #[async_trait::async_trait]
    impl LlmProvider for CompletionsDown {
        fn name(&self) -> &'static str {
            "completions-down"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Err(AgentError::ApiRequest {
                message: "service unavailable".to_string(),
                status: Some(503),
            })
        }

        async fn chat_stream(&self, request: &ChatRequest) -> Result<EventStream, AgentError> {
            self.0.chat_stream(request).await
        }
    }

    #[tokio::test]
    async fn test_agent_aborts_when_paper_tool_loses_model() {
        let provider = Arc::new(CompletionsDown(ScriptedProvider::new(vec![
            call(0, "gemini_paper", r#"{"input":"What is Gemini?"}"#),
            text("Gemini is a model family."),
        ])));
        let tools = ToolSet::register(vec![
            paper_tool("gemini_paper", provider.clone()),
            Arc::new(WeatherTool),
        ])
        .unwrap_or_else(|_| unreachable!());
        let router =
            QueryRouter::new(tools, provider, "agent", &config()).unwrap_or_else(|_| unreachable!());
        assert_eq!(router.mode(), RouteMode::MultiToolAgent);

        let stream = router.route("What is Gemini?").await.unwrap_or_else(|_| unreachable!());
        let mut out = Vec::new();
        let result = stream.drain_into(&mut out).await;
        assert!(matches!(
            result,
            Err(Error::Agent(AgentError::ApiRequest { status: Some(503), .. }))
        ));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_drain_returns_text_after_last_tool_call() {
        let mut first = text("Let me compute that. ");
        first.extend(call(0, "multiply", r#"{"a":7,"b":6}"#));
        let provider = Arc::new(ScriptedProvider::new(vec![
            first,
            text("```python\nprint(7 * 6)\n```"),
        ]));
        let tools = ToolSet::register(math_tools()).unwrap_or_else(|_| unreachable!());
        let router = router(tools, provider);

        let stream = router.route("What is 7 * 6?").await.unwrap_or_else(|_| unreachable!());
        let mut out = Vec::new();
        let text = stream.drain_into(&mut out).await.unwrap_or_else(|_| unreachable!());
        assert_eq!(text, "```python\nprint(7 * 6)\n```");
        assert_eq!(
            String::from_utf8_lossy(&out),
            "Let me compute that. ```python\nprint(7 * 6)\n```"
        );
    }
}
