//! Resumable, budgeted scan over the catalog file.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, info, instrument};

use super::CatalogError;
use super::record::{CatalogRecord, RecordError, parse_record};
use crate::state::StateStore;

const COUNT_BUFFER_BYTES: usize = 64 * 1024;

/// Location and known length of a line-delimited catalog.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    path: PathBuf,
    total_lines: u64,
}

impl CatalogSource {
    /// Uses a known line count instead of counting the file.
    #[must_use]
    pub fn with_line_count(path: impl Into<PathBuf>, total_lines: u64) -> Self {
        Self {
            path: path.into(),
            total_lines,
        }
    }

    /// Opens a catalog by counting its lines once.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Open`] / [`CatalogError::Read`] when the file
    /// cannot be read.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn counted(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let total_lines = count_lines(&path).await?;
        info!(total_lines, "catalog line count");
        Ok(Self { path, total_lines })
    }

    /// Path to the catalog file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of lines in the catalog.
    #[must_use]
    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }
}

/// Per-run cap on qualified attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    max: u32,
    used: u32,
}

impl AttemptBudget {
    /// Creates a budget allowing `max` attempts.
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self { max, used: 0 }
    }

    /// Counts one qualified attempt.
    pub fn record_attempt(&mut self) {
        self.used = self.used.saturating_add(1);
    }

    /// Attempts counted so far.
    #[must_use]
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Attempts still allowed.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.used)
    }

    /// Whether no more attempts are allowed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

/// Result of one [`CatalogScanner::next`] call.
#[derive(Debug)]
pub enum ScanStep {
    /// A parsed record read from 1-based `line`.
    Record {
        /// 1-based line number.
        line: u64,
        /// The parsed record.
        record: CatalogRecord,
    },
    /// A line that could not be parsed. The cursor still advanced past it.
    Malformed {
        /// 1-based line number.
        line: u64,
        /// Why parsing failed.
        error: RecordError,
    },
    /// Every line has been consumed for this query.
    EndOfCatalog,
    /// The per-run attempt budget is spent.
    BudgetExhausted,
}

/// Sequential reader over a catalog that resumes from the persisted cursor
/// of its query.
///
/// The persisted cursor is the number of lines consumed. It is written to
/// the store before each line is handed out, whether or not that line later
/// qualifies.
#[derive(Debug)]
pub struct CatalogScanner {
    reader: Option<BufReader<File>>,
    path: PathBuf,
    query: String,
    store: StateStore,
    cursor: u64,
    total_lines: u64,
    budget: AttemptBudget,
}

impl CatalogScanner {
    /// Opens the catalog and positions the reader after the persisted cursor
    /// of `query`.
    ///
    /// When the cursor already reached the catalog length the file is not
    /// read at all.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the cursor cannot be loaded or the file
    /// cannot be opened or read.
    #[instrument(skip(source, store), fields(path = %source.path().display(), query = %query))]
    pub async fn open(
        source: &CatalogSource,
        query: &str,
        store: StateStore,
        budget: AttemptBudget,
    ) -> Result<Self, CatalogError> {
        let cursor = store.get_cursor(query).await?.unwrap_or(0);
        let total_lines = source.total_lines();

        let mut scanner = Self {
            reader: None,
            path: source.path().to_path_buf(),
            query: query.to_string(),
            store,
            cursor,
            total_lines,
            budget,
        };

        if cursor >= total_lines {
            info!(cursor, total_lines, "query has exhausted the catalog");
            return Ok(scanner);
        }

        let file = File::open(&scanner.path)
            .await
            .map_err(|e| CatalogError::open(&scanner.path, e))?;
        let mut reader = BufReader::new(file);
        let mut skipped = 0_u64;
        let mut buf = Vec::new();
        while skipped < cursor {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| CatalogError::read(&scanner.path, skipped + 1, e))?;
            if read == 0 {
                break;
            }
            skipped += 1;
        }
        debug!(cursor, skipped, "resumed catalog position");
        scanner.reader = Some(reader);
        Ok(scanner)
    }

    /// Reads the next catalog line.
    ///
    /// Order of checks: catalog exhausted, then attempt budget, then read.
    /// The cursor is persisted before the line is parsed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog cannot be read or the
    /// cursor cannot be persisted. A line that fails to parse is not an
    /// error; it comes back as [`ScanStep::Malformed`].
    pub async fn next(&mut self) -> Result<ScanStep, CatalogError> {
        if self.cursor >= self.total_lines {
            return Ok(ScanStep::EndOfCatalog);
        }
        if self.budget.is_exhausted() {
            return Ok(ScanStep::BudgetExhausted);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(ScanStep::EndOfCatalog);
        };

        let line_number = self.cursor + 1;
        let mut buf = Vec::new();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| CatalogError::read(&self.path, line_number, e))?;
        if read == 0 {
            debug!(line = line_number, "catalog file ended before its declared length");
            self.reader = None;
            return Ok(ScanStep::EndOfCatalog);
        }

        self.cursor = line_number;
        self.store.set_cursor(&self.query, self.cursor).await?;

        let step = match String::from_utf8(buf) {
            Ok(text) => match parse_record(text.trim_end_matches(['\n', '\r'])) {
                Ok(record) => ScanStep::Record {
                    line: line_number,
                    record,
                },
                Err(error) => ScanStep::Malformed {
                    line: line_number,
                    error,
                },
            },
            Err(_) => ScanStep::Malformed {
                line: line_number,
                error: RecordError::Encoding,
            },
        };
        Ok(step)
    }

    /// Counts one qualified attempt against the run budget.
    pub fn record_attempt(&mut self) {
        self.budget.record_attempt();
    }

    /// The run budget.
    #[must_use]
    pub fn budget(&self) -> AttemptBudget {
        self.budget
    }

    /// Lines consumed for this query, as persisted.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Total catalog length.
    #[must_use]
    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    /// The query this scan is scoped to.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Counts newline-terminated lines, plus a trailing unterminated one.
async fn count_lines(path: &Path) -> Result<u64, CatalogError> {
    let mut file = File::open(path)
        .await
        .map_err(|e| CatalogError::open(path, e))?;
    let mut buf = vec![0_u8; COUNT_BUFFER_BYTES];
    let mut lines = 0_u64;
    let mut last = None;
    loop {
        let read = file
            .read(&mut buf)
            .await
            .map_err(|e| CatalogError::read(path, lines + 1, e))?;
        if read == 0 {
            break;
        }
        let chunk = &buf[..read];
        lines += chunk.iter().filter(|&&b| b == b'\n').count() as u64;
        last = chunk.last().copied();
    }
    if last.is_some_and(|b| b != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    fn line(id: u32, title: &str) -> String {
        format!(
            r#"{{"book_id": "{id}", "title": "{title}", "isbn": "{id}", "ratings_count": "150", "average_rating": "4.1"}}"#
        )
    }

    async fn setup(lines: &[String]) -> (TempDir, CatalogSource, StateStore) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        let source = CatalogSource::counted(&path).await.unwrap();
        let store = StateStore::new(Database::new_in_memory().await.unwrap());
        (temp_dir, source, store)
    }

    #[tokio::test]
    async fn test_count_lines_handles_missing_trailing_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.json");
        std::fs::write(&path, "a\nb\nc").unwrap();
        assert_eq!(count_lines(&path).await.unwrap(), 3);
        std::fs::write(&path, "").unwrap();
        assert_eq!(count_lines(&path).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scanner_persists_cursor_for_every_line() {
        let lines: Vec<String> = (1..=4).map(|i| line(i, "Foo")).collect();
        let (_tmp, source, store) = setup(&lines).await;
        let mut scanner = CatalogScanner::open(&source, "Foo", store.clone(), AttemptBudget::new(10))
            .await
            .unwrap();

        for expected in 1..=3_u64 {
            let step = scanner.next().await.unwrap();
            assert!(matches!(step, ScanStep::Record { line, .. } if line == expected));
            assert_eq!(store.get_cursor("Foo").await.unwrap(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_scanner_resumes_after_persisted_cursor() {
        let lines: Vec<String> = (1..=4).map(|i| line(i, "Foo")).collect();
        let (_tmp, source, store) = setup(&lines).await;
        store.set_cursor("Foo", 2).await.unwrap();

        let mut scanner = CatalogScanner::open(&source, "Foo", store.clone(), AttemptBudget::new(10))
            .await
            .unwrap();
        match scanner.next().await.unwrap() {
            ScanStep::Record { line, record } => {
                assert_eq!(line, 3);
                assert_eq!(record.id, "3");
            }
            other => panic!("Expected record, got: {other:?}"),
        }
        assert_eq!(store.get_cursor("Foo").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_scanner_malformed_line_advances_cursor() {
        let lines = vec![line(1, "Foo"), "{not json".to_string(), line(3, "Foo")];
        let (_tmp, source, store) = setup(&lines).await;
        let mut scanner = CatalogScanner::open(&source, "Foo", store.clone(), AttemptBudget::new(10))
            .await
            .unwrap();

        scanner.next().await.unwrap();
        assert!(matches!(
            scanner.next().await.unwrap(),
            ScanStep::Malformed { line: 2, .. }
        ));
        assert_eq!(store.get_cursor("Foo").await.unwrap(), Some(2));
        assert!(matches!(
            scanner.next().await.unwrap(),
            ScanStep::Record { line: 3, .. }
        ));
        assert_eq!(scanner.budget().used(), 0);
    }

    #[tokio::test]
    async fn test_scanner_end_of_catalog_when_cursor_equals_length() {
        let lines: Vec<String> = (1..=2).map(|i| line(i, "Foo")).collect();
        let (_tmp, source, store) = setup(&lines).await;
        store.set_cursor("Foo", 2).await.unwrap();

        let mut scanner = CatalogScanner::open(&source, "Foo", store.clone(), AttemptBudget::new(10))
            .await
            .unwrap();
        assert!(matches!(scanner.next().await.unwrap(), ScanStep::EndOfCatalog));
        assert_eq!(store.get_cursor("Foo").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_scanner_reaches_end_after_last_line() {
        let lines: Vec<String> = (1..=2).map(|i| line(i, "Foo")).collect();
        let (_tmp, source, store) = setup(&lines).await;
        let mut scanner = CatalogScanner::open(&source, "Foo", store, AttemptBudget::new(10))
            .await
            .unwrap();

        scanner.next().await.unwrap();
        scanner.next().await.unwrap();
        assert!(matches!(scanner.next().await.unwrap(), ScanStep::EndOfCatalog));
        assert_eq!(scanner.cursor(), 2);
    }

    #[tokio::test]
    async fn test_scanner_budget_exhausted_does_not_consume_line() {
        let lines: Vec<String> = (1..=3).map(|i| line(i, "Foo")).collect();
        let (_tmp, source, store) = setup(&lines).await;
        let mut scanner = CatalogScanner::open(&source, "Foo", store.clone(), AttemptBudget::new(1))
            .await
            .unwrap();

        scanner.next().await.unwrap();
        scanner.record_attempt();
        assert!(matches!(
            scanner.next().await.unwrap(),
            ScanStep::BudgetExhausted
        ));
        assert_eq!(store.get_cursor("Foo").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_scanner_declared_length_longer_than_file_ends_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, line(1, "Foo") + "\n").unwrap();
        let source = CatalogSource::with_line_count(&path, 50);
        let store = StateStore::new(Database::new_in_memory().await.unwrap());

        let mut scanner = CatalogScanner::open(&source, "Foo", store, AttemptBudget::new(5))
            .await
            .unwrap();
        assert!(matches!(scanner.next().await.unwrap(), ScanStep::Record { .. }));
        assert!(matches!(scanner.next().await.unwrap(), ScanStep::EndOfCatalog));
    }

    #[tokio::test]
    async fn test_scanner_invalid_utf8_line_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        let mut bytes = vec![0xff, 0xfe, b'\n'];
        bytes.extend_from_slice(line(2, "Foo").as_bytes());
        std::fs::write(&path, bytes).unwrap();
        let source = CatalogSource::counted(&path).await.unwrap();
        let store = StateStore::new(Database::new_in_memory().await.unwrap());

        let mut scanner = CatalogScanner::open(&source, "Foo", store, AttemptBudget::new(5))
            .await
            .unwrap();
        assert!(matches!(
            scanner.next().await.unwrap(),
            ScanStep::Malformed {
                line: 1,
                error: RecordError::Encoding
            }
        ));
        assert!(matches!(
            scanner.next().await.unwrap(),
            ScanStep::Record { line: 2, .. }
        ));
    }

    #[test]
    fn test_attempt_budget_counts_down() {
        let mut budget = AttemptBudget::new(2);
        assert_eq!(budget.remaining(), 2);
        budget.record_attempt();
        assert!(!budget.is_exhausted());
        budget.record_attempt();
        assert!(budget.is_exhausted());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_zero_budget_is_exhausted_immediately() {
        assert!(AttemptBudget::new(0).is_exhausted());
    }
}
