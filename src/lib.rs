//! Bookfetch Core Library
//!
//! This library provides the core functionality for the bookfetch tool,
//! which walks a large book catalog, keeps the records worth having, finds
//! files for them in a bibliographic index and downloads them. Runs resume
//! where the previous one stopped.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`state`] - State Store: scan cursors and named sets
//! - [`catalog`] - Catalog record parsing and the resumable scanner
//! - [`filter`] - Qualification predicate chain
//! - [`search`] - Candidate resolution against the index
//! - [`download`] - Link resolution and streaming downloads
//! - [`pipeline`] - The sequential acquisition loop

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod db;
pub mod download;
pub mod filter;
pub mod pipeline;
pub mod search;
pub mod state;
mod user_agent;
mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use catalog::{
    AttemptBudget, CatalogError, CatalogRecord, CatalogScanner, CatalogSource, ScanStep,
};
pub use db::{Database, DbError};
pub use download::{
    DownloadError, DownloadManager, HttpClient, HttpSettings, LibgenAdsLinkResolver,
    LinkResolver, ProgressDisplay,
};
pub use filter::{
    AvoidedKeywords, QualificationFilter, QualificationThresholds, RejectReason, Verdict,
};
pub use pipeline::{AcquisitionPipeline, PipelineError, PipelineSettings, RunSummary, StopReason};
pub use search::{BookIndex, FileCandidate, FileFormat, LibgenIndex, SearchError};
pub use state::{NamedSet, StateError, StateStore};
