//! Persistent State Store: per-query scan cursors and named identifier sets.
//!
//! The store holds three things:
//! - the scan cursor for each topical query ([`StateStore::get_cursor`])
//! - the set of record identifiers already sent past qualification
//! - the set of avoided title keywords
//!
//! Access is plain read-then-write. One process is expected to touch the
//! store at a time; the store does not enforce it.
//!
//! # Example
//!
//! ```ignore
//! use bookfetch_core::{Database, NamedSet, StateStore};
//!
//! let db = Database::new_in_memory().await?;
//! let store = StateStore::new(db);
//!
//! store.set_cursor("Existentialist", 42).await?;
//! store.add_member(NamedSet::AttemptedRecords, "5333265").await?;
//! ```

mod error;

pub use error::StateError;

use std::fmt;

use sqlx::Row;
use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// The named sets the store maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedSet {
    /// Identifiers of records that passed qualification at least once.
    /// Only ever grows.
    AttemptedRecords,
    /// Title tokens that disqualify a record.
    AvoidedKeywords,
}

impl NamedSet {
    /// Returns the stable storage key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AttemptedRecords => "attempted_records",
            Self::AvoidedKeywords => "avoided_keywords",
        }
    }
}

impl fmt::Display for NamedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to the cursor map and named sets.
#[derive(Debug, Clone)]
pub struct StateStore {
    db: Database,
}

impl StateStore {
    /// Creates a store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Reads the persisted cursor for `query`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the read fails, or
    /// [`StateError::InvalidCursor`] if the stored value is negative.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn get_cursor(&self, query: &str) -> Result<Option<u64>> {
        let row = sqlx::query("SELECT position FROM scan_cursor WHERE query = ?")
            .bind(query)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| StateError::database("get_cursor", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value: i64 = row.get("position");
        u64::try_from(value)
            .map(Some)
            .map_err(|_| StateError::InvalidCursor {
                query: query.to_string(),
                value,
            })
    }

    /// Persists the cursor for `query`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the write fails.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn set_cursor(&self, query: &str, position: u64) -> Result<()> {
        let position = i64::try_from(position).map_err(|_| StateError::InvalidCursor {
            query: query.to_string(),
            value: i64::MAX,
        })?;

        sqlx::query(
            r"INSERT INTO scan_cursor (query, position, updated_at)
              VALUES (?, ?, datetime('now'))
              ON CONFLICT(query) DO UPDATE SET
                  position = excluded.position,
                  updated_at = excluded.updated_at",
        )
        .bind(query)
        .bind(position)
        .execute(self.db.pool())
        .await
        .map_err(|e| StateError::database("set_cursor", e))?;

        debug!(position, "cursor persisted");
        Ok(())
    }

    /// Returns whether `value` is a member of `set`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the read fails.
    #[instrument(skip(self), fields(set = %set))]
    pub async fn is_member(&self, set: NamedSet, value: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM set_member WHERE set_name = ? AND value = ?")
            .bind(set.as_str())
            .bind(value)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| StateError::database("is_member", e))?;
        Ok(row.is_some())
    }

    /// Adds `value` to `set`. Returns `true` if it was not already present.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the write fails.
    #[instrument(skip(self), fields(set = %set))]
    pub async fn add_member(&self, set: NamedSet, value: &str) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO set_member (set_name, value) VALUES (?, ?)")
                .bind(set.as_str())
                .bind(value)
                .execute(self.db.pool())
                .await
                .map_err(|e| StateError::database("add_member", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes `value` from `set`. Returns `true` if it was present.
    ///
    /// Administrative use only; the pipeline never shrinks the attempted set.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the write fails.
    #[instrument(skip(self), fields(set = %set))]
    pub async fn remove_member(&self, set: NamedSet, value: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM set_member WHERE set_name = ? AND value = ?")
            .bind(set.as_str())
            .bind(value)
            .execute(self.db.pool())
            .await
            .map_err(|e| StateError::database("remove_member", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Lists all members of `set` in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the read fails.
    #[instrument(skip(self), fields(set = %set))]
    pub async fn members(&self, set: NamedSet) -> Result<Vec<String>> {
        let rows =
            sqlx::query("SELECT value FROM set_member WHERE set_name = ? ORDER BY rowid ASC")
                .bind(set.as_str())
                .fetch_all(self.db.pool())
                .await
                .map_err(|e| StateError::database("members", e))?;
        Ok(rows.iter().map(|row| row.get("value")).collect())
    }

    /// Counts the members of `set`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the read fails.
    #[instrument(skip(self), fields(set = %set))]
    pub async fn count_members(&self, set: NamedSet) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM set_member WHERE set_name = ?")
            .bind(set.as_str())
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| StateError::database("count_members", e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
