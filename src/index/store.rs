//! Build-or-load cache of index handles.
//!
//! Each corpus title owns `storage/<title>/`. If that directory exists its
//! handle is loaded and never rebuilt; otherwise the handle is built from
//! the papers directory and persisted before it is returned.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

use super::chunk::DEFAULT_CHUNK_TOKENS;
use super::document::{load_documents, resolve_sources};
use super::handle::IndexHandle;
use crate::error::IndexError;

/// Resolves corpus titles to index handles.
#[derive(Debug)]
pub struct IndexStore {
    papers_dir: PathBuf,
    storage_dir: Option<PathBuf>,
    builds: AtomicUsize,
    loads: AtomicUsize,
}

impl IndexStore {
    /// Creates a store over `papers_dir`.
    ///
    /// With `storage_dir` set to `None` persistence is off: every lookup
    /// builds from sources and the filesystem cache is never touched.
    #[must_use]
    pub fn new(papers_dir: impl Into<PathBuf>, storage_dir: Option<PathBuf>) -> Self {
        Self {
            papers_dir: papers_dir.into(),
            storage_dir,
            builds: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        }
    }

    /// Persistence directory for `title`, if persistence is on.
    #[must_use]
    pub fn persist_dir(&self, title: &str) -> Option<PathBuf> {
        self.storage_dir.as_ref().map(|dir| dir.join(title))
    }

    /// Rejects titles that are empty or could escape the base directories.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidTitle`].
    pub fn validate_title(title: &str) -> Result<(), IndexError> {
        let invalid = title.trim().is_empty()
            || title.contains(['/', '\\'])
            || title.contains("..")
            || title.starts_with('.');
        if invalid {
            return Err(IndexError::InvalidTitle {
                title: title.to_string(),
            });
        }
        Ok(())
    }

    /// Returns the handle for `title`, loading it from the cache when one
    /// is persisted and calling `build` (then persisting) otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::PersistenceCorrupt`] for an unusable cache
    /// entry, any error from `build`, or [`IndexError::Io`] if persisting
    /// fails.
    pub fn get_or_build<F>(&self, title: &str, build: F) -> Result<IndexHandle, IndexError>
    where
        F: FnOnce() -> Result<IndexHandle, IndexError>,
    {
        Self::validate_title(title)?;

        let Some(dir) = self.persist_dir(title) else {
            let handle = build()?;
            self.builds.fetch_add(1, Ordering::Relaxed);
            info!(title, chunks = handle.len(), "built index (persistence off)");
            return Ok(handle);
        };

        if dir.exists() {
            let handle = IndexHandle::load(&dir, title)?;
            self.loads.fetch_add(1, Ordering::Relaxed);
            info!(title, chunks = handle.len(), path = %dir.display(), "loaded index");
            return Ok(handle);
        }

        let handle = build()?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        handle.save(&dir)?;
        info!(title, chunks = handle.len(), path = %dir.display(), "built and persisted index");
        Ok(handle)
    }

    /// Returns the handle for `title`, building it from the papers
    /// directory when it is not cached.
    ///
    /// # Errors
    ///
    /// See [`Self::get_or_build`] and [`Self::build_from_sources`].
    pub fn get_index(&self, title: &str) -> Result<IndexHandle, IndexError> {
        self.get_or_build(title, || self.build_from_sources(title))
    }

    /// Builds a fresh handle from the source documents for `title`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::SourceNotFound`] if the title resolves to no
    /// readable, non-empty document.
    pub fn build_from_sources(&self, title: &str) -> Result<IndexHandle, IndexError> {
        let sources = resolve_sources(&self.papers_dir, title);
        let corpus_dir = self.papers_dir.join(title);
        let root = if corpus_dir.is_dir() {
            corpus_dir.as_path()
        } else {
            self.papers_dir.as_path()
        };

        let documents = load_documents(root, &sources)?;
        if documents.is_empty() {
            return Err(IndexError::SourceNotFound {
                title: title.to_string(),
            });
        }
        Ok(IndexHandle::build(title, &documents, DEFAULT_CHUNK_TOKENS))
    }

    /// Number of handles built by this store.
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of handles loaded from the cache by this store.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    struct Fixture {
        _tmp: tempfile::TempDir,
        papers: PathBuf,
        storage: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let papers = tmp.path().join("papers");
        let storage = tmp.path().join("storage");
        std::fs::create_dir_all(papers.join("mixtral")).unwrap_or_else(|_| unreachable!());
        std::fs::write(
            papers.join("mixtral/paper.txt"),
            "Mixtral routes each token to two of eight experts.",
        )
        .unwrap_or_else(|_| unreachable!());
        std::fs::write(papers.join("gemini.md"), "Gemini is multimodal.")
            .unwrap_or_else(|_| unreachable!());
        Fixture {
            _tmp: tmp,
            papers,
            storage,
        }
    }

    #[test]
    fn test_second_lookup_loads_instead_of_rebuilding() {
        let fx = fixture();
        let store = IndexStore::new(&fx.papers, Some(fx.storage.clone()));

        let first = store.get_index("mixtral").unwrap_or_else(|_| unreachable!());
        assert!(fx.storage.join("mixtral/index.json").is_file());
        let second = store.get_index("mixtral").unwrap_or_else(|_| unreachable!());

        assert_eq!(store.build_count(), 1);
        assert_eq!(store.load_count(), 1);
        assert_eq!(first.len(), second.len());
        assert_eq!(second.chunks()[0].source, "paper.txt");
    }

    #[test]
    fn test_fresh_store_loads_persisted_handle() {
        let fx = fixture();
        IndexStore::new(&fx.papers, Some(fx.storage.clone()))
            .get_index("gemini")
            .unwrap_or_else(|_| unreachable!());

        // Sources gone: the persisted handle must still be served.
        std::fs::remove_file(fx.papers.join("gemini.md")).unwrap_or_else(|_| unreachable!());
        let store = IndexStore::new(&fx.papers, Some(fx.storage.clone()));
        let handle = store.get_index("gemini").unwrap_or_else(|_| unreachable!());
        assert_eq!(handle.title(), "gemini");
        assert_eq!(store.build_count(), 0);
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn test_corrupt_cache_is_reported_not_repaired() {
        let fx = fixture();
        let dir = fx.storage.join("mixtral");
        std::fs::create_dir_all(&dir).unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.join("index.json"), "{ not json").unwrap_or_else(|_| unreachable!());

        let store = IndexStore::new(&fx.papers, Some(fx.storage.clone()));
        let result = store.get_index("mixtral");
        assert!(matches!(result, Err(IndexError::PersistenceCorrupt { .. })));
        assert_eq!(store.build_count(), 0);
        let raw = std::fs::read_to_string(dir.join("index.json")).unwrap_or_else(|_| unreachable!());
        assert_eq!(raw, "{ not json");
    }

    #[test]
    fn test_empty_cache_directory_is_corrupt() {
        let fx = fixture();
        std::fs::create_dir_all(fx.storage.join("gemini")).unwrap_or_else(|_| unreachable!());
        let store = IndexStore::new(&fx.papers, Some(fx.storage.clone()));
        assert!(matches!(
            store.get_index("gemini"),
            Err(IndexError::PersistenceCorrupt { .. })
        ));
    }

    #[test]
    fn test_unknown_corpus_is_source_not_found() {
        let fx = fixture();
        let store = IndexStore::new(&fx.papers, Some(fx.storage.clone()));
        let result = store.get_index("llama");
        assert!(matches!(result, Err(IndexError::SourceNotFound { ref title }) if title == "llama"));
        assert!(!fx.storage.join("llama").exists());
    }

    #[test]
    fn test_persistence_off_never_touches_storage() {
        let fx = fixture();
        let store = IndexStore::new(&fx.papers, None);
        store.get_index("mixtral").unwrap_or_else(|_| unreachable!());
        store.get_index("mixtral").unwrap_or_else(|_| unreachable!());
        assert_eq!(store.build_count(), 2);
        assert_eq!(store.load_count(), 0);
        assert!(!fx.storage.exists());
    }

    #[test]
    fn test_get_or_build_uses_supplied_builder() {
        let fx = fixture();
        let store = IndexStore::new(&fx.papers, Some(fx.storage.clone()));
        let handle = store
            .get_or_build("custom", || Ok(IndexHandle::build("custom", &[], 512)))
            .unwrap_or_else(|_| unreachable!());
        assert!(handle.is_empty());
        assert!(fx.storage.join("custom/index.json").is_file());
    }

    #[test_case(""; "empty")]
    #[test_case("../etc"; "parent")]
    #[test_case("a/b"; "separator")]
    #[test_case(".hidden"; "dotfile")]
    fn test_invalid_titles(title: &str) {
        assert!(matches!(
            IndexStore::validate_title(title),
            Err(IndexError::InvalidTitle { .. })
        ));
    }
}
