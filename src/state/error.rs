//! Error types for State Store operations.

use thiserror::Error;

/// Errors raised by [`StateStore`](super::StateStore) operations.
///
/// Any of these during a run is fatal: without the store no progress can be
/// persisted.
#[derive(Debug, Error)]
pub enum StateError {
    /// A query against the backing database failed.
    #[error("state store {operation} failed: {source}")]
    Database {
        /// Which store operation was running.
        operation: &'static str,
        /// The underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// A stored cursor value could not be represented as a position.
    #[error("stored cursor for query '{query}' is invalid: {value}")]
    InvalidCursor {
        /// The query whose cursor row is corrupt.
        query: String,
        /// The raw stored value.
        value: i64,
    },
}

impl StateError {
    /// Wraps a driver error with the name of the failing operation.
    pub fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_database_display_names_operation() {
        let error = StateError::database("set_cursor", sqlx::Error::PoolClosed);
        let msg = error.to_string();
        assert!(msg.contains("set_cursor"), "Expected operation in: {msg}");
    }

    #[test]
    fn test_state_error_invalid_cursor_display() {
        let error = StateError::InvalidCursor {
            query: "Existentialist".to_string(),
            value: -4,
        };
        let msg = error.to_string();
        assert!(msg.contains("Existentialist"));
        assert!(msg.contains("-4"));
    }
}
