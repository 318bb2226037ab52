//! The queryable index handle.
//!
//! An [`IndexHandle`] is a keyword (BM25) index over the chunks of one
//! corpus. It is serialised as pretty JSON so the cache directory stays
//! inspectable; [`FORMAT_VERSION`] guards against loading handles written by
//! an incompatible build.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::chunk::chunk_text;
use super::document::Document;
use crate::error::IndexError;

/// On-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// File holding the handle inside its persistence directory.
pub const INDEX_FILE: &str = "index.json";

/// BM25 term-frequency saturation.
const BM25_K1: f64 = 1.2;
/// BM25 length normalisation.
const BM25_B: f64 = 0.75;

/// One indexed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Position in the handle.
    pub id: usize,
    /// Source document name.
    pub source: String,
    /// Chunk text.
    pub text: String,
    term_freqs: BTreeMap<String, u32>,
    length: u32,
}

/// A retrieved chunk with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Chunk position.
    pub id: usize,
    /// Source document name.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// BM25 score (0 when no query term matched).
    pub score: f64,
}

/// Queryable retrieval structure for one corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHandle {
    version: u32,
    title: String,
    chunks: Vec<IndexedChunk>,
    doc_freqs: BTreeMap<String, u32>,
    avg_len: f64,
}

/// Lower-cased Unicode words.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

impl IndexHandle {
    /// Chunks and indexes `documents`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(title: &str, documents: &[Document], chunk_tokens: usize) -> Self {
        let mut chunks = Vec::new();
        let mut doc_freqs: BTreeMap<String, u32> = BTreeMap::new();

        for doc in documents {
            for text in chunk_text(&doc.text, chunk_tokens) {
                let terms = tokenize(&text);
                let mut term_freqs: BTreeMap<String, u32> = BTreeMap::new();
                for term in &terms {
                    *term_freqs.entry(term.clone()).or_default() += 1;
                }
                for term in term_freqs.keys() {
                    *doc_freqs.entry(term.clone()).or_default() += 1;
                }
                chunks.push(IndexedChunk {
                    id: chunks.len(),
                    source: doc.source.clone(),
                    text,
                    term_freqs,
                    length: u32::try_from(terms.len()).unwrap_or(u32::MAX),
                });
            }
        }

        let total: u64 = chunks.iter().map(|c| u64::from(c.length)).sum();
        let avg_len = if chunks.is_empty() {
            0.0
        } else {
            total as f64 / chunks.len() as f64
        };

        Self {
            version: FORMAT_VERSION,
            title: title.to_string(),
            chunks,
            doc_freqs,
            avg_len,
        }
    }

    /// Corpus title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Indexed chunks, in document order.
    #[must_use]
    pub fn chunks(&self) -> &[IndexedChunk] {
        &self.chunks
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the corpus produced no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns up to `top_k` chunks ranked by BM25, best first.
    ///
    /// Ties (including all-zero scores) keep document order, so a query with
    /// no matching terms still yields the leading chunks as context.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        let n = self.chunks.len() as f64;

        let mut scored: Vec<(usize, f64)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(pos, chunk)| {
                let norm = if self.avg_len > 0.0 {
                    f64::from(chunk.length) / self.avg_len
                } else {
                    1.0
                };
                let score = terms
                    .iter()
                    .filter_map(|term| {
                        let tf = f64::from(*chunk.term_freqs.get(term)?);
                        let df = f64::from(self.doc_freqs.get(term).copied().unwrap_or(0));
                        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                        Some(idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm)))
                    })
                    .sum();
                (pos, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);
        debug!(title = %self.title, hits = scored.len(), "index search");

        scored
            .into_iter()
            .map(|(pos, score)| {
                let chunk = &self.chunks[pos];
                ScoredChunk {
                    id: chunk.id,
                    source: chunk.source.clone(),
                    text: chunk.text.clone(),
                    score,
                }
            })
            .collect()
    }

    /// Writes the handle to `dir/index.json`, creating `dir`.
    ///
    /// Writes to a temporary file first and renames it into place.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] on filesystem failure.
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, dir.join(INDEX_FILE))?;
        Ok(())
    }

    /// Loads the handle persisted in `dir` for `title`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::PersistenceCorrupt`] if the file is missing,
    /// unreadable, not valid JSON, from another format version, or for a
    /// different title.
    pub fn load(dir: &Path, title: &str) -> Result<Self, IndexError> {
        let corrupt = |message: String| IndexError::PersistenceCorrupt {
            path: dir.to_path_buf(),
            message,
        };

        let raw = std::fs::read_to_string(dir.join(INDEX_FILE))
            .map_err(|e| corrupt(format!("cannot read {INDEX_FILE}: {e}")))?;
        let handle: Self = serde_json::from_str(&raw)
            .map_err(|e| corrupt(format!("invalid {INDEX_FILE}: {e}")))?;

        if handle.version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "format version {} (expected {FORMAT_VERSION})",
                handle.version
            )));
        }
        if handle.title != title {
            return Err(corrupt(format!(
                "handle is for corpus '{}', not '{title}'",
                handle.title
            )));
        }
        if let Some((pos, chunk)) = handle
            .chunks
            .iter()
            .enumerate()
            .find(|(pos, chunk)| chunk.id != *pos)
        {
            return Err(corrupt(format!("chunk {pos} carries id {}", chunk.id)));
        }
        Ok(handle)
    }
}
