//! Retrieval-augmented query engine (single-index question answering).
//!
//! A [`QueryEngine`] retrieves the top chunks for a query from one
//! [`IndexHandle`], packs them into context batches and asks the model to
//! answer: the first batch with the QA template, every later batch with the
//! refine template over the answer so far.

use std::sync::Arc;

use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, EventStream};
use crate::agent::prompt::PromptSet;
use crate::agent::provider::LlmProvider;
use crate::error::AgentError;
use crate::index::{IndexHandle, ScoredChunk};

/// Answers questions over one index.
pub struct QueryEngine {
    index: Arc<IndexHandle>,
    provider: Arc<dyn LlmProvider>,
    prompts: Arc<PromptSet>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_k: usize,
    max_context_chars: usize,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("title", &self.index.title())
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl QueryEngine {
    /// Creates an engine over `index` using the model settings in `config`.
    #[must_use]
    pub fn new(
        index: Arc<IndexHandle>,
        provider: Arc<dyn LlmProvider>,
        prompts: Arc<PromptSet>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            index,
            provider,
            prompts,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_k: config.similarity_top_k,
            max_context_chars: config.max_context_chars,
        }
    }

    /// Title of the wrapped index.
    #[must_use]
    pub fn title(&self) -> &str {
        self.index.title()
    }

    /// Retrieves the chunks used as context for `query`.
    #[must_use]
    pub fn retrieve(&self, query: &str) -> Vec<ScoredChunk> {
        self.index.search(query, self.top_k)
    }

    /// Answers `query` without streaming.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if any model call fails.
    pub async fn answer(&self, query: &str) -> Result<String, AgentError> {
        let batches = self.batches(query);
        let mut answer: Option<String> = None;
        for batch in &batches {
            let request = self.request(batch, query, answer.as_deref(), false);
            answer = Some(self.provider.chat(&request).await?.content);
        }
        Ok(answer.unwrap_or_default())
    }

    /// Answers `query`, streaming the final pass.
    ///
    /// Earlier refine passes run to completion before the returned stream
    /// starts.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if a non-final pass or the stream setup fails.
    pub async fn answer_stream(&self, query: &str) -> Result<EventStream, AgentError> {
        let batches = self.batches(query);
        let Some((last, earlier)) = batches.split_last() else {
            return Err(AgentError::Stream {
                message: "no context batches".to_string(),
            });
        };

        let mut answer: Option<String> = None;
        for batch in earlier {
            let request = self.request(batch, query, answer.as_deref(), false);
            answer = Some(self.provider.chat(&request).await?.content);
        }

        let request = self.request(last, query, answer.as_deref(), true);
        self.provider.chat_stream(&request).await
    }

    /// Packs the retrieved chunks into context strings of at most
    /// `max_context_chars`. Always yields at least one (possibly empty) batch.
    fn batches(&self, query: &str) -> Vec<String> {
        let chunks = self.retrieve(query);
        debug!(
            title = self.index.title(),
            retrieved = chunks.len(),
            "retrieved context"
        );
        pack_context(chunks.iter().map(|c| c.text.as_str()), self.max_context_chars)
    }

    fn request(
        &self,
        context: &str,
        query: &str,
        existing_answer: Option<&str>,
        stream: bool,
    ) -> ChatRequest {
        let messages: Vec<ChatMessage> = match existing_answer {
            None => self.prompts.qa_messages(context, query),
            Some(existing) => self.prompts.refine_messages(context, query, existing),
        };
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            stream,
            tools: Vec::new(),
        }
    }
}

/// Joins texts with blank lines into batches of at most `max_chars`.
///
/// A text longer than `max_chars` forms a batch of its own.
fn pack_context<'a>(texts: impl Iterator<Item = &'a str>, max_chars: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();
    for text in texts {
        if !current.is_empty() && current.len() + 2 + text.len() > max_chars {
            batches.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(text);
    }
    if !current.is_empty() || batches.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::StreamEvent;
    use crate::agent::mock::{ScriptedProvider, text};
    use crate::agent::prompt::TemplateStyle;
    use crate::index::Document;
    use futures_util::StreamExt;

    fn config(max_context_chars: usize) -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .model("test-model")
            .max_context_chars(max_context_chars)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn engine(provider: Arc<ScriptedProvider>, max_context_chars: usize) -> QueryEngine {
        let docs = vec![Document {
            source: "mixtral.txt".to_string(),
            text: "Mixtral has eight experts per layer.\n\nA router picks two experts per token."
                .to_string(),
        }];
        let index = Arc::new(IndexHandle::build("mixtral", &docs, 10));
        QueryEngine::new(
            index,
            provider,
            Arc::new(PromptSet::defaults(TemplateStyle::MathCode)),
            &config(max_context_chars),
        )
    }

    #[test]
    fn test_pack_context() {
        assert_eq!(pack_context(std::iter::empty(), 10), vec![String::new()]);
        assert_eq!(pack_context(["ab", "cd"].into_iter(), 10), vec!["ab\n\ncd"]);
        assert_eq!(pack_context(["abcd", "efgh"].into_iter(), 8), vec!["abcd", "efgh"]);
        assert_eq!(
            pack_context(["a very long text", "x"].into_iter(), 4),
            vec!["a very long text", "x"]
        );
    }

    #[tokio::test]
    async fn test_answer_single_pass_uses_qa_template() {
        let provider = Arc::new(ScriptedProvider::new(vec![text("Two experts.")]));
        let engine = engine(Arc::clone(&provider), 12_000);

        let answer = engine
            .answer("How many experts per token?")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(answer, "Two experts.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].stream);
        let user = &requests[0].messages[1].content;
        assert!(user.starts_with("Context information is below."));
        assert!(user.contains("A router picks two experts per token."));
        assert!(user.contains("Mixtral has eight experts per layer."));
    }

    #[tokio::test]
    async fn test_answer_stream_refines_over_batches() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            text("draft"),
            vec![
                StreamEvent::Text("final ".to_string()),
                StreamEvent::Text("answer".to_string()),
            ],
        ]));
        // Each chunk alone fills a batch.
        let engine = engine(Arc::clone(&provider), 40);

        let stream = engine
            .answer_stream("experts per token")
            .await
            .unwrap_or_else(|_| unreachable!());
        let tokens: Vec<StreamEvent> = stream
            .map(|e| e.unwrap_or_else(|_| unreachable!()))
            .collect()
            .await;
        assert_eq!(tokens.len(), 2);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].stream);
        assert!(requests[1].stream);
        let refine = &requests[1].messages[1].content;
        assert!(refine.starts_with("We have the opportunity to refine"));
        assert!(refine.ends_with("Original Answer: draft"));
    }

    #[tokio::test]
    async fn test_answer_surfaces_provider_error() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let engine = engine(provider, 12_000);
        let result = engine.answer("anything").await;
        assert!(matches!(result, Err(AgentError::ApiRequest { .. })));
    }
}
