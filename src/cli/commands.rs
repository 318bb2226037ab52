//! CLI command implementation.
//!
//! Loads the env file, resolves configuration, builds the pipeline and
//! answers the query on a Tokio runtime.

use std::io::Write;

use tracing::debug;

use crate::agent::client::create_provider;
use crate::agent::config::{AgentConfig, load_env_file};
use crate::agent::prompt::TemplateStyle;
use crate::cli::parser::Cli;
use crate::error::{CommandError, Result};
use crate::pipeline::{Pipeline, PipelineConfig};

/// Builds the pipeline configuration from the profile and flags.
#[must_use]
pub fn pipeline_config(cli: &Cli) -> PipelineConfig {
    let mut config = PipelineConfig::for_profile(cli.profile);
    if !cli.corpora.is_empty() {
        config = config.with_corpora(&cli.corpora);
    }
    if cli.no_math {
        config.math_tools = false;
    }
    if cli.no_weather {
        config.weather_tool = false;
    }
    if cli.default_templates {
        config.template_style = TemplateStyle::Default;
    }
    config.persist = !cli.no_persist;
    config.papers_dir.clone_from(&cli.papers_dir);
    config.storage_dir.clone_from(&cli.storage_dir);
    config.output_dir.clone_from(&cli.output_dir);
    config
}

/// Resolves the model configuration: flags, then environment, then defaults.
///
/// # Errors
///
/// Returns a configuration error for a missing API key or invalid values.
pub fn agent_config(cli: &Cli) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder();
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(dir) = &cli.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    Ok(builder.from_env()?.build()?)
}

/// Answers the query, streaming the response to `out`.
///
/// # Returns
///
/// A trailing status line for the caller to print: the artifact path when
/// the answer was code, otherwise an empty string.
///
/// # Errors
///
/// Configuration errors are returned before any index or network work;
/// index, upstream and I/O errors abort the query.
pub fn execute<W: Write>(cli: &Cli, out: &mut W) -> Result<String> {
    let loaded = load_env_file(&cli.env_file)?;
    debug!(env_file = %cli.env_file.display(), loaded, "environment ready");

    let agent = agent_config(cli)?;
    let provider = create_provider(&agent)?;
    let config = pipeline_config(cli);

    let pipeline = Pipeline::build(&config, &agent, provider)?;

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;
    let outcome = rt.block_on(pipeline.run(&cli.query, out))?;

    Ok(outcome
        .artifact
        .map(|path| format!("Code written to {}", path.display()))
        .unwrap_or_default())
}
