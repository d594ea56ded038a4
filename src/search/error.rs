//! Error types for index searches.

use thiserror::Error;

/// Errors from a [`BookIndex`](super::BookIndex) search.
///
/// None of these are fatal to a run: the record is skipped.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The configured mirror is not a usable base URL.
    #[error("invalid search mirror URL: {url}")]
    InvalidMirror {
        /// The rejected mirror URL.
        url: String,
    },

    /// Network-level failure talking to the index.
    #[error("search request to {url} failed: {source}")]
    Transport {
        /// Request URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The index answered with a non-success status.
    #[error("search request to {url} returned HTTP {status}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The index answered with something that could not be read.
    #[error("unreadable search response from {url}: {reason}")]
    MalformedResponse {
        /// Request URL.
        url: String,
        /// What was wrong with the body.
        reason: String,
    },
}

impl SearchError {
    /// Creates a transport error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
