//! End-to-end query pipeline.
//!
//! A [`PipelineConfig`] names everything that differs between the chat and
//! agent set-ups: which corpora to index, which function tools to wire,
//! which QA templates to use, whether indexes are persisted and where files
//! live. [`Pipeline::build`] turns it into an index store, query engines, a
//! tool set and a router; [`Pipeline::run`] answers one query.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;
use tracing::info;

use crate::agent::config::AgentConfig;
use crate::agent::prompt::{PromptSet, TemplateStyle};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::{Tool, ToolSet};
use crate::error::{CommandError, ConfigError, Result};
use crate::index::{ALL_TITLE, IndexStore};
use crate::query::QueryEngine;
use crate::response::ArtifactWriter;
use crate::router::{QueryRouter, RouteMode};
use crate::tools::retrieval::{generic_description, tool_name};
use crate::tools::{QueryEngineTool, WeatherTool, math_tools};

/// Preset pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Profile {
    /// Single-index chat over the whole papers directory.
    #[default]
    Chat,
    /// Tool-calling agent over the paper tools, arithmetic and weather.
    Agent,
}

/// A corpus wired as a retrieval tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSpec {
    /// Corpus title (resolved against the papers directory).
    pub title: String,
    /// Tool name exposed to the model.
    pub tool_name: String,
    /// Tool description exposed to the model.
    pub description: String,
}

impl CorpusSpec {
    /// Spec for `title`, using the catalogue entry when there is one.
    #[must_use]
    pub fn for_title(title: &str) -> Self {
        catalogue()
            .into_iter()
            .find(|spec| spec.title == title)
            .unwrap_or_else(|| Self {
                title: title.to_string(),
                tool_name: tool_name(title),
                description: generic_description(title),
            })
    }
}

/// The known paper corpora.
fn catalogue() -> Vec<CorpusSpec> {
    vec![
        CorpusSpec {
            title: "google_deepmind_gemini_family".to_string(),
            tool_name: "gemini_paper".to_string(),
            description: "Provides information about the Gemini family of models. \
                Use a detailed plain text question as input to the tool."
                .to_string(),
        },
        CorpusSpec {
            title: "mistral_ai_mixtral_of_experts".to_string(),
            tool_name: "mistral_paper".to_string(),
            description: "Provides information about the mixtral model, especially its special \
                architecture. Use a detailed plain text question as input to the tool."
                .to_string(),
        },
        CorpusSpec {
            title: ALL_TITLE.to_string(),
            tool_name: "papers".to_string(),
            description: "Provides information from every document in the papers directory. \
                Use a detailed plain text question as input to the tool."
                .to_string(),
        },
    ]
}

/// Everything that varies between pipeline set-ups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Corpora wired as retrieval tools, in order.
    pub corpora: Vec<CorpusSpec>,
    /// Wire the six arithmetic tools.
    pub math_tools: bool,
    /// Wire the weather lookup.
    pub weather_tool: bool,
    /// QA templates for the query engines.
    pub template_style: TemplateStyle,
    /// Persist index handles under `storage_dir`.
    pub persist: bool,
    /// Source documents.
    pub papers_dir: PathBuf,
    /// Index cache.
    pub storage_dir: PathBuf,
    /// Code artifact directory.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::chat()
    }
}

impl PipelineConfig {
    /// Single-index chat: the whole papers directory, math-code templates.
    #[must_use]
    pub fn chat() -> Self {
        Self {
            corpora: vec![CorpusSpec::for_title(ALL_TITLE)],
            math_tools: false,
            weather_tool: false,
            template_style: TemplateStyle::MathCode,
            persist: true,
            papers_dir: PathBuf::from("papers"),
            storage_dir: PathBuf::from("storage"),
            output_dir: PathBuf::from("output"),
        }
    }

    /// Multi-tool agent: two paper tools, arithmetic and weather.
    #[must_use]
    pub fn agent() -> Self {
        Self {
            corpora: vec![
                CorpusSpec::for_title("google_deepmind_gemini_family"),
                CorpusSpec::for_title("mistral_ai_mixtral_of_experts"),
            ],
            math_tools: true,
            weather_tool: true,
            template_style: TemplateStyle::Default,
            ..Self::chat()
        }
    }

    /// Preset for `profile`.
    #[must_use]
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Chat => Self::chat(),
            Profile::Agent => Self::agent(),
        }
    }

    /// Replaces the wired corpora.
    #[must_use]
    pub fn with_corpora<S: AsRef<str>>(mut self, titles: &[S]) -> Self {
        self.corpora = titles
            .iter()
            .map(|t| CorpusSpec::for_title(t.as_ref()))
            .collect();
        self
    }

    fn has_tools(&self) -> bool {
        !self.corpora.is_empty() || self.math_tools || self.weather_tool
    }
}

/// Result of answering one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Final answer text: the last turn, after any tool calls.
    pub text: String,
    /// Artifact written for a code response.
    pub artifact: Option<PathBuf>,
}

/// A wired pipeline, ready to answer queries.
#[derive(Debug)]
pub struct Pipeline {
    store: IndexStore,
    router: QueryRouter,
    artifacts: ArtifactWriter,
}

impl Pipeline {
    /// Loads or builds every index and wires the tools and router.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyToolSet`] before any index work when
    /// nothing is wired, index errors for unresolvable or corrupt corpora,
    /// and [`crate::error::ToolError::DuplicateTool`] for clashing names.
    pub fn build(
        config: &PipelineConfig,
        agent: &AgentConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        if !config.has_tools() {
            return Err(ConfigError::EmptyToolSet.into());
        }

        let prompts = Arc::new(PromptSet::load(
            agent.prompt_dir.as_deref(),
            config.template_style,
        ));
        let storage = config.persist.then(|| config.storage_dir.clone());
        let store = IndexStore::new(&config.papers_dir, storage);

        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        if config.math_tools {
            tools.extend(math_tools());
        }
        for corpus in &config.corpora {
            let index = Arc::new(store.get_index(&corpus.title)?);
            let engine = QueryEngine::new(index, Arc::clone(&provider), Arc::clone(&prompts), agent);
            tools.push(Arc::new(QueryEngineTool::new(
                corpus.tool_name.clone(),
                corpus.description.clone(),
                Arc::new(engine),
            )));
        }
        if config.weather_tool {
            tools.push(Arc::new(WeatherTool));
        }

        let tools = ToolSet::register(tools)?;
        let router = QueryRouter::new(tools, provider, prompts.agent_system.clone(), agent)?;
        info!(
            mode = ?router.mode(),
            builds = store.build_count(),
            loads = store.load_count(),
            "pipeline ready"
        );

        Ok(Self {
            store,
            router,
            artifacts: ArtifactWriter::new(&config.output_dir),
        })
    }

    /// Selected route.
    #[must_use]
    pub const fn mode(&self) -> RouteMode {
        self.router.mode()
    }

    /// Index store used to build the pipeline.
    #[must_use]
    pub const fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Streams the answer to `query` into `out`, then persists code.
    ///
    /// # Errors
    ///
    /// Returns upstream errors from the model, or [`CommandError::Io`] if
    /// `out` or the artifact cannot be written.
    pub async fn run<W: Write>(&self, query: &str, out: &mut W) -> Result<RunOutcome> {
        let stream = self.router.route(query).await?;
        let text = stream.drain_into(out).await?;
        let artifact = self.artifacts.finalize(&text).map_err(CommandError::Io)?;
        Ok(RunOutcome { text, artifact })
    }
}
