//! Response classification and code persistence.
//!
//! A response that is exactly one fenced `python` block is treated as code:
//! its body is written to the artifact file (by default
//! `output/math_expression.py`) so it can be inspected and run. Anything
//! else is natural language and leaves the filesystem untouched.

use std::path::{Path, PathBuf};

use tracing::info;

/// Opening fence of a code response.
const CODE_FENCE_OPEN: &str = "```python";
/// Closing fence of a code response.
const CODE_FENCE_CLOSE: &str = "```";

/// Default artifact file name.
pub const DEFAULT_ARTIFACT_NAME: &str = "math_expression.py";

/// What a final response contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// A fenced python block; `body` is the text between the fences.
    Code {
        /// Lines between the opening and closing fence.
        body: String,
    },
    /// Anything else.
    NaturalLanguage,
}

/// Classifies a complete response.
///
/// The body drops the first and last lines of the trimmed text, so a
/// response shorter than three lines yields an empty body. The code is not
/// validated.
#[must_use]
pub fn classify(text: &str) -> ResponseKind {
    let trimmed = text.trim();
    if !(trimmed.starts_with(CODE_FENCE_OPEN) && trimmed.ends_with(CODE_FENCE_CLOSE)) {
        return ResponseKind::NaturalLanguage;
    }

    let lines: Vec<&str> = trimmed.split('\n').collect();
    let body = if lines.len() < 3 {
        String::new()
    } else {
        lines[1..lines.len() - 1].join("\n")
    };
    ResponseKind::Code { body }
}

/// Writes code responses to the artifact file.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    file_name: String,
}

impl ArtifactWriter {
    /// Writer targeting `dir/math_expression.py`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_name: DEFAULT_ARTIFACT_NAME.to_string(),
        }
    }

    /// Overrides the artifact file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Artifact path.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists the body of a code response, overwriting any previous
    /// artifact. Returns the path written, or `None` for natural language.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be written.
    pub fn finalize(&self, text: &str) -> std::io::Result<Option<PathBuf>> {
        let ResponseKind::Code { body } = classify(text) else {
            return Ok(None);
        };

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path();
        std::fs::write(&path, body)?;
        info!(path = %path.display(), "wrote code artifact");
        Ok(Some(path))
    }
}
