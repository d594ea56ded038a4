//! Error types for the download module.
//!
//! Every variant abandons one candidate only; the pipeline moves on to the
//! next candidate or record.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving or downloading a candidate file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The download page did not yield a link.
    #[error("no download link for {content_id}: {reason}")]
    LinkResolution {
        /// Candidate content identifier.
        content_id: String,
        /// What was missing.
        reason: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors,
    /// body stream interrupted).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The request phase did not complete in time.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Writing the destination file failed.
    #[error("storage error writing to {path}: {source}")]
    Storage {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Why construction failed.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a link-resolution error.
    pub fn link_resolution(content_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LinkResolution {
            content_id: content_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
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

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a storage error.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Coarse failure class for logs and run summaries.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::LinkResolution { .. } => "link_resolution",
            Self::Storage { .. } => "storage",
            Self::ClientBuild { .. } => "client",
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidUrl { .. } => "download",
        }
    }
}

// No blanket `From<reqwest::Error>` / `From<std::io::Error>`: every variant
// needs the url or path the source error does not carry.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("http://libgen.li/get.php?md5=abc");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("get.php"));
        assert_eq!(error.class(), "download");
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("http://libgen.li/get.php", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
    }

    #[test]
    fn test_download_error_storage_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::storage(PathBuf::from("/books/A.epub"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/books/A.epub"), "Expected path in: {msg}");
        assert_eq!(error.class(), "storage");
    }

    #[test]
    fn test_download_error_link_resolution_display() {
        let error = DownloadError::link_resolution("abc123", "anchor missing from main table");
        let msg = error.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("anchor missing"));
        assert_eq!(error.class(), "link_resolution");
    }
}
