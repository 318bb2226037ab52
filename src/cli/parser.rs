//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use crate::agent::config::DEFAULT_ENV_FILE;
use crate::pipeline::Profile;

/// paperchat: ask questions about a folder of papers.
///
/// Answers one query per invocation, either straight from a single
/// document index or through a tool-calling agent that can also do
/// arithmetic and look up the weather.
#[derive(Parser, Debug)]
#[command(name = "paperchat")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"Examples:
  paperchat "Summarise the Gemini paper"                 # Chat over ./papers
  paperchat --profile agent "What is 7 * 6?"             # Agent with tools
  paperchat --profile agent --corpus llama "..."         # Agent over papers/llama
  paperchat --no-persist "What does Mixtral route?"      # Never touch ./storage
"#)]
pub struct Cli {
    /// The question to ask.
    pub query: String,

    /// Preset pipeline.
    #[arg(long, value_enum, default_value_t = Profile::Chat, env = "PAPERCHAT_PROFILE")]
    pub profile: Profile,

    /// Corpus title to wire as a retrieval tool (repeatable).
    ///
    /// Replaces the profile's corpora.
    #[arg(long = "corpus", value_name = "TITLE")]
    pub corpora: Vec<String>,

    /// Do not wire the arithmetic tools.
    #[arg(long)]
    pub no_math: bool,

    /// Do not wire the weather tool.
    #[arg(long)]
    pub no_weather: bool,

    /// Build indexes in memory only; never read or write the storage directory.
    #[arg(long)]
    pub no_persist: bool,

    /// Use the generic QA templates instead of the math-as-code ones.
    #[arg(long)]
    pub default_templates: bool,

    /// Source documents directory.
    #[arg(long, default_value = "papers", env = "PAPERCHAT_PAPERS_DIR")]
    pub papers_dir: PathBuf,

    /// Index cache directory.
    #[arg(long, default_value = "storage", env = "PAPERCHAT_STORAGE_DIR")]
    pub storage_dir: PathBuf,

    /// Directory for extracted code.
    #[arg(long, default_value = "output", env = "PAPERCHAT_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Env file loaded before reading configuration.
    #[arg(long, default_value = DEFAULT_ENV_FILE, env = "PAPERCHAT_ENV_FILE")]
    pub env_file: PathBuf,

    /// Chat model [default: gpt-4-1106-preview].
    #[arg(long, env = "PAPERCHAT_MODEL")]
    pub model: Option<String>,

    /// Sampling temperature (0.0-2.0).
    #[arg(long, env = "PAPERCHAT_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Directory with prompt template overrides.
    #[arg(long, env = "PAPERCHAT_PROMPT_DIR")]
    pub prompt_dir: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}
