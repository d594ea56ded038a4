//! Catalog access: record parsing and the resumable scanner.
//!
//! # Overview
//!
//! - [`CatalogRecord`] - one parsed catalog line
//! - [`CatalogSource`] - catalog path plus its total line count
//! - [`CatalogScanner`] - cursor-resuming, budget-enforcing line reader
//! - [`ScanStep`] - what a single scan call produced

mod record;
mod scanner;

pub use record::{CatalogRecord, RecordError, parse_record};
pub use scanner::{AttemptBudget, CatalogScanner, CatalogSource, ScanStep};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::state::StateError;

/// Fatal catalog errors. Malformed lines are not errors; see
/// [`ScanStep::Malformed`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be opened.
    #[error("failed to open catalog {path}: {source}")]
    Open {
        /// Catalog path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the catalog failed mid-scan.
    #[error("failed to read catalog {path} at line {line}: {source}")]
    Read {
        /// Catalog path.
        path: PathBuf,
        /// 1-based line being read.
        line: u64,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The scan cursor could not be loaded or persisted.
    #[error(transparent)]
    State(#[from] StateError),
}

impl CatalogError {
    /// Creates an open error.
    pub fn open(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a read error.
    pub fn read(path: impl AsRef<Path>, line: u64, source: std::io::Error) -> Self {
        Self::Read {
            path: path.as_ref().to_path_buf(),
            line,
            source,
        }
    }
}
