//! Error types for paperchat.
//!
//! Each layer owns a `thiserror` enum; [`Error`] aggregates them for the
//! pipeline and CLI. Configuration and index errors abort before any model
//! call, tool errors are reported back to the agent as tool results, and
//! upstream ([`AgentError`]) errors abort the current query.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Corpus resolution, build, or persistence failure.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Tool registration or execution failure.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Failure talking to the language model.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Configuration errors. Always reported before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key in the explicit settings, the environment, or the env file.
    #[error("API key missing: set OPENAI_API_KEY (or PAPERCHAT_API_KEY) or add it to the env file")]
    ApiKeyMissing,

    /// A setting is present but cannot be used.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// What is wrong with it.
        message: String,
    },

    /// Provider name not known to the provider factory.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Requested provider.
        name: String,
    },

    /// The pipeline was configured without any tool to route to.
    #[error("no tools configured: wire at least one corpus or function tool")]
    EmptyToolSet,

    /// The env file exists but could not be parsed.
    #[error("failed to load env file {path}: {message}")]
    EnvFile {
        /// Env file path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Document index errors.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Neither a persisted handle nor source documents exist for the title.
    #[error("no persisted index or source documents for corpus '{title}'")]
    SourceNotFound {
        /// Corpus title.
        title: String,
    },

    /// A persisted handle exists but cannot be loaded. Never auto-repaired.
    #[error("persisted index at {} is unreadable: {message}", path.display())]
    PersistenceCorrupt {
        /// Persistence directory.
        path: PathBuf,
        /// Reason.
        message: String,
    },

    /// Title is empty or would escape the papers/storage directories.
    #[error("invalid corpus title '{title}'")]
    InvalidTitle {
        /// Offending title.
        title: String,
    },

    /// Text extraction from a source document failed.
    #[error("failed to extract text from {}: {message}", path.display())]
    Extract {
        /// Source file.
        path: PathBuf,
        /// Extractor message.
        message: String,
    },

    /// Filesystem failure while reading sources or writing the cache.
    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tool errors. In agent mode these are surfaced to the model as tool
/// results, except [`ToolError::Upstream`].
#[derive(Debug, Error)]
pub enum ToolError {
    /// Division (or negative power) with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// Argument outside the function's domain.
    #[error("domain error: {message}")]
    Domain {
        /// Explanation.
        message: String,
    },

    /// Integer result does not fit in 64 bits.
    #[error("integer overflow in {operation}")]
    Overflow {
        /// Operation name.
        operation: &'static str,
    },

    /// Arguments could not be decoded against the tool's schema.
    #[error("invalid arguments for {name}: {message}")]
    InvalidArguments {
        /// Tool name.
        name: String,
        /// Decoder message.
        message: String,
    },

    /// The model asked for a tool that is not registered.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// Requested name.
        name: String,
    },

    /// Two tools were registered under the same name.
    #[error("duplicate tool name: {name}")]
    DuplicateTool {
        /// Duplicated name.
        name: String,
    },

    /// The tool ran but failed.
    #[error("tool {name} failed: {message}")]
    Execution {
        /// Tool name.
        name: String,
        /// Failure message.
        message: String,
    },

    /// The model call behind a retrieval tool failed. Aborts the query
    /// instead of being reported to the agent.
    #[error("tool {name} failed upstream: {source}")]
    Upstream {
        /// Tool name.
        name: String,
        /// Underlying model error.
        #[source]
        source: AgentError,
    },
}

/// Upstream (language model) errors. Fatal for the current query, never retried.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The chat completion request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The response stream broke mid-way.
    #[error("response stream failed: {message}")]
    Stream {
        /// Provider message.
        message: String,
    },

    /// The model kept requesting tools past the iteration limit.
    #[error("tool-calling loop exceeded {max_iterations} iterations")]
    ToolLoopExceeded {
        /// Configured limit.
        max_iterations: usize,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Generic command failure.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Writing to stdout or the artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
