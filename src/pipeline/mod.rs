//! The sequential acquisition loop.
//!
//! One record at a time: scan, qualify, search, select, download. Nothing
//! below the per-record boundary is fatal; only the State Store and the
//! catalog file can stop a run early.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::catalog::{CatalogError, CatalogRecord, CatalogScanner, ScanStep};
use crate::download::{DownloadManager, book_filename};
use crate::filter::{QualificationFilter, RejectReason, Verdict};
use crate::search::{BookIndex, DEFAULT_SIZE_CEILING_BYTES, select_candidates};
use crate::state::{StateError, StateStore};

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The State Store failed.
    #[error("state store failure: {0}")]
    State(#[from] StateError),

    /// The catalog could not be read, or its cursor not persisted.
    #[error("catalog failure: {0}")]
    Catalog(#[from] CatalogError),
}

/// Per-run pipeline inputs besides the collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Existing directory downloads are written into.
    pub output_dir: PathBuf,
    /// Largest acceptable candidate, in bytes.
    pub size_ceiling: u64,
}

impl PipelineSettings {
    /// Settings with the default size ceiling.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            size_ceiling: DEFAULT_SIZE_CEILING_BYTES,
        }
    }
}

/// Why a run ended. Both are normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// Every catalog line has been consumed for the query.
    #[default]
    EndOfCatalog,
    /// The attempt budget was reached.
    BudgetExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfCatalog => f.write_str("end of catalog"),
            Self::BudgetExhausted => f.write_str("attempt budget exhausted"),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Why the run ended.
    pub stop: StopReason,
    /// Catalog lines consumed this run, malformed ones included.
    pub lines_scanned: u64,
    /// Lines that failed to parse.
    pub malformed: u64,
    /// Rejections keyed by [`RejectReason::label`].
    pub rejected: BTreeMap<&'static str, u64>,
    /// Records that qualified and went to the index.
    pub attempts: u64,
    /// Index searches that failed.
    pub search_failures: u64,
    /// Records the index knew no files for.
    pub no_candidates: u64,
    /// Records with candidates but none under the ceiling in EPUB or PDF.
    pub nothing_selected: u64,
    /// Files written.
    pub downloaded: u64,
    /// Selected files that failed to download.
    pub download_failures: u64,
}

impl RunSummary {
    /// Total rejections across reasons.
    #[must_use]
    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }

    fn reject(&mut self, reason: &RejectReason) {
        *self.rejected.entry(reason.label()).or_insert(0) += 1;
    }
}

/// Wires the five components into the acquisition loop.
pub struct AcquisitionPipeline {
    store: StateStore,
    scanner: CatalogScanner,
    filter: QualificationFilter,
    index: Arc<dyn BookIndex>,
    downloads: DownloadManager,
    settings: PipelineSettings,
}

impl AcquisitionPipeline {
    /// Creates a pipeline. The query is the one `scanner` was opened for.
    #[must_use]
    pub fn new(
        store: StateStore,
        scanner: CatalogScanner,
        filter: QualificationFilter,
        index: Arc<dyn BookIndex>,
        downloads: DownloadManager,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            scanner,
            filter,
            index,
            downloads,
            settings,
        }
    }

    /// Runs until the catalog or the attempt budget is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only when the State Store or the catalog
    /// fails. Search and download failures are logged and counted.
    #[instrument(skip(self), fields(query = %self.scanner.query()))]
    pub async fn run(mut self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        info!(
            cursor = self.scanner.cursor(),
            total_lines = self.scanner.total_lines(),
            budget = self.scanner.budget().remaining(),
            "starting acquisition run"
        );

        loop {
            match self.scanner.next().await? {
                ScanStep::EndOfCatalog => {
                    summary.stop = StopReason::EndOfCatalog;
                    break;
                }
                ScanStep::BudgetExhausted => {
                    summary.stop = StopReason::BudgetExhausted;
                    break;
                }
                ScanStep::Malformed { line, error } => {
                    summary.lines_scanned += 1;
                    summary.malformed += 1;
                    warn!(line, error = %error, "skipping malformed catalog line");
                }
                ScanStep::Record { line, record } => {
                    summary.lines_scanned += 1;
                    self.process(line, &record, &mut summary).await?;
                }
            }
        }

        info!(
            stop = %summary.stop,
            cursor = self.scanner.cursor(),
            lines = summary.lines_scanned,
            attempts = summary.attempts,
            downloaded = summary.downloaded,
            failed = summary.download_failures,
            "acquisition run finished"
        );
        Ok(summary)
    }

    async fn process(
        &mut self,
        line: u64,
        record: &CatalogRecord,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let query = self.scanner.query().to_string();
        let verdict = self.filter.qualify(record, &query, &self.store).await?;

        if let Verdict::Reject(reason) = verdict {
            if reason == RejectReason::NoTopicalMatch {
                trace!(line, id = %record.id, "no topical match");
            } else {
                info!(line, id = %record.id, title = %record.title, reason = %reason, "skipping record");
            }
            summary.reject(&reason);
            return Ok(());
        }

        self.scanner.record_attempt();
        summary.attempts += 1;
        info!(line, id = %record.id, title = %record.title, "record qualified");

        let Some(isbn) = record.isbn.as_deref() else {
            return Ok(());
        };
        let candidates = match self.index.search(isbn).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(id = %record.id, isbn, index = self.index.name(), error = %error, "search failed");
                summary.search_failures += 1;
                return Ok(());
            }
        };
        if candidates.is_empty() {
            info!(id = %record.id, isbn, "no candidates");
            summary.no_candidates += 1;
            return Ok(());
        }

        let selected = select_candidates(&candidates, self.settings.size_ceiling);
        debug!(
            found = candidates.len(),
            selected = selected.len(),
            "candidates ranked"
        );
        if selected.is_empty() {
            info!(id = %record.id, found = candidates.len(), "no EPUB or PDF under the size ceiling");
            summary.nothing_selected += 1;
            return Ok(());
        }

        for candidate in selected {
            let filename = book_filename(
                &record.title,
                record.publication_year,
                candidate.format.extension(),
            );
            let destination = self.settings.output_dir.join(filename);
            match self.downloads.download(candidate, &destination).await {
                Ok(file) => {
                    info!(path = %file.path.display(), bytes = file.bytes, "file saved");
                    summary.downloaded += 1;
                }
                Err(error) => {
                    warn!(
                        id = %record.id,
                        md5 = %candidate.content_id,
                        class = error.class(),
                        error = %error,
                        "download failed"
                    );
                    summary.download_failures += 1;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AcquisitionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionPipeline")
            .field("scanner", &self.scanner)
            .field("index", &self.index.name())
            .field("downloads", &self.downloads)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
