//! # paperchat
//!
//! Command-line chat over a small collection of papers.
//!
//! One query per invocation is answered either directly from a single
//! document index (retrieval-augmented QA) or by a tool-calling agent that
//! can pick among paper tools, arithmetic functions and a weather lookup.
//! Answers that are a fenced python block are written to disk.
//!
//! ## Modules
//!
//! - [`index`]: corpus resolution, BM25 index handles and their on-disk cache
//! - [`agent`]: model client, messages, prompts, tool registry and agent loop
//! - [`tools`]: arithmetic, weather and retrieval tools
//! - [`query`]: single-index query engine
//! - [`router`]: mode selection and response streams
//! - [`response`]: response classification and code persistence
//! - [`pipeline`]: profile-driven wiring of all of the above
//! - [`cli`]: command-line interface

pub mod agent;
pub mod cli;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod query;
pub mod response;
pub mod router;
pub mod tools;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineConfig, Profile};
pub use response::{ArtifactWriter, ResponseKind, classify};
pub use router::{QueryRouter, ResponseStream, RouteMode};
