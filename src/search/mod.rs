//! Candidate resolution: query a bibliographic index by ISBN and pick files.
//!
//! # Architecture
//!
//! - [`BookIndex`] - async trait for the external search collaborator
//! - [`LibgenIndex`] - HTTP implementation against a Library Genesis mirror
//! - [`FileCandidate`] / [`FileFormat`] - one search result
//! - [`select_candidates`] - the EPUB/PDF selection policy

mod error;
mod libgen;
mod selection;

pub use error::SearchError;
pub use libgen::{DEFAULT_SEARCH_MIRROR, LibgenIndex};
pub use selection::{DEFAULT_SIZE_CEILING_BYTES, select_candidates};

use std::fmt;

use async_trait::async_trait;

/// File format tag of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// EPUB e-book.
    Epub,
    /// PDF document.
    Pdf,
    /// Anything else (mobi, djvu, ...). Never selected.
    Other(String),
}

impl FileFormat {
    /// Parses an extension tag, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        let normalized = extension.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "epub" => Self::Epub,
            "pdf" => Self::Pdf,
            _ => Self::Other(normalized),
        }
    }

    /// The file extension, without a leading dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        match self {
            Self::Epub => "epub",
            Self::Pdf => "pdf",
            Self::Other(ext) => ext,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One file offered by the index for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Format tag.
    pub format: FileFormat,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Content-addressable identifier (an MD5 digest) used to resolve the
    /// download link.
    pub content_id: String,
}

impl FileCandidate {
    /// Creates a candidate.
    pub fn new(format: FileFormat, size_bytes: u64, content_id: impl Into<String>) -> Self {
        Self {
            format,
            size_bytes,
            content_id: content_id.into(),
        }
    }
}

/// Sorts candidates ascending by size, keeping index order among equals.
pub fn sort_by_size(candidates: &mut [FileCandidate]) {
    candidates.sort_by_key(|candidate| candidate.size_bytes);
}

/// External search collaborator keyed on ISBN.
///
/// Implementations return candidates ascending by file size. An empty
/// vector means the index knows no files for this ISBN.
#[async_trait]
pub trait BookIndex: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Searches the index by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] on transport failure or an unreadable
    /// response.
    async fn search(&self, isbn: &str) -> Result<Vec<FileCandidate>, SearchError>;
}
