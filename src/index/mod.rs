//! Document index provider.
//!
//! Resolves corpus titles to source documents, builds keyword indexes over
//! their chunks and caches the handles on disk.

pub mod chunk;
pub mod document;
pub mod handle;
pub mod store;

pub use document::{ALL_TITLE, Document};
pub use handle::{IndexHandle, ScoredChunk};
pub use store::IndexStore;
