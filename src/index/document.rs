//! Source document discovery and text extraction.
//!
//! A corpus title resolves against the papers directory, first match wins:
//!
//! 1. `papers/<title>/`: every non-hidden file below it,
//! 2. `papers/<title>.pdf`, `.md` or `.txt`,
//! 3. the reserved title [`ALL_TITLE`]: every non-hidden file directly in
//!    the papers directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::IndexError;

/// Title that selects every document in the papers directory.
pub const ALL_TITLE: &str = "all";

/// Extensions tried for single-file corpora, in order.
pub const SOURCE_EXTENSIONS: [&str; 3] = ["pdf", "md", "txt"];

/// Extracted text of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name relative to the corpus root.
    pub source: String,
    /// Extracted text.
    pub text: String,
}

/// Lists the source files for `title`. Empty when nothing matches.
#[must_use]
pub fn resolve_sources(papers_dir: &Path, title: &str) -> Vec<PathBuf> {
    let dir = papers_dir.join(title);
    if dir.is_dir() {
        return list_files(&dir, usize::MAX);
    }

    for ext in SOURCE_EXTENSIONS {
        let file = papers_dir.join(format!("{title}.{ext}"));
        if file.is_file() {
            return vec![file];
        }
    }

    if title == ALL_TITLE && papers_dir.is_dir() {
        return list_files(papers_dir, 1);
    }

    Vec::new()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn list_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .collect()
}

/// Reads and extracts every path, skipping empty and non-UTF-8 files.
///
/// # Errors
///
/// Returns [`IndexError::Extract`] if a PDF cannot be parsed and
/// [`IndexError::Io`] if a file cannot be read.
pub fn load_documents(root: &Path, paths: &[PathBuf]) -> Result<Vec<Document>, IndexError> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(text) = extract_text(path)? else {
            continue;
        };
        if text.trim().is_empty() {
            debug!(path = %path.display(), "skipping empty document");
            continue;
        }
        let source = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        documents.push(Document { source, text });
    }
    Ok(documents)
}

fn extract_text(path: &Path) -> Result<Option<String>, IndexError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        return pdf_extract::extract_text(path)
            .map(Some)
            .map_err(|e| IndexError::Extract {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
    }

    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(Some(text)),
        Err(_) => {
            warn!(path = %path.display(), "skipping non-UTF-8 document");
            Ok(None)
        }
    }
}
