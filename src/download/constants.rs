//! Constants for the download module (timeouts).

/// HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Bound on the request phase of a download, up to response headers
/// (10 seconds). The body stream is not separately bounded.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Bound on a link-resolution page fetch, body included.
pub const LINK_PAGE_TIMEOUT_SECS: u64 = 30;
