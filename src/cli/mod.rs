//! CLI layer for paperchat.
//!
//! Parses the single-query command line and runs it through the pipeline.

pub mod commands;
pub mod parser;

pub use commands::execute;
pub use parser::Cli;
