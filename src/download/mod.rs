//! Download manager: link resolution and streaming files to disk.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Bounded request phase (10s by default); the body stream is unbounded
//! - Percentage progress per chunk when the size is known
//! - Structured error types with full context
//! - Writes go through a `.part` file; existing files are never overwritten
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use bookfetch_core::download::{
//!     DownloadManager, HttpClient, HttpSettings, LibgenAdsLinkResolver, ProgressDisplay,
//! };
//! use bookfetch_core::search::{FileCandidate, FileFormat};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(&HttpSettings::default())?;
//! let links = LibgenAdsLinkResolver::new(client.inner().clone(), "http://libgen.li")?;
//! let manager = DownloadManager::new(client, Arc::new(links), ProgressDisplay::Terminal);
//!
//! let candidate = FileCandidate::new(FileFormat::Epub, 512_000, "0123456789abcdef");
//! let file = manager
//!     .download(&candidate, Path::new("./books/Nausea (1938).epub"))
//!     .await?;
//! println!("Downloaded: {}", file.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod filename;
mod link;
mod manager;
mod progress;

pub use client::{HttpClient, HttpSettings, StreamedFile};
pub use constants::{CONNECT_TIMEOUT_SECS, LINK_PAGE_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
pub use error::DownloadError;
pub use filename::{book_filename, resolve_unique_path, sanitize_title};
pub use link::{DEFAULT_DOWNLOAD_MIRROR, LibgenAdsLinkResolver, LinkResolver};
pub use manager::{DownloadManager, DownloadedFile};
pub use progress::{
    LogProgress, NoProgress, ProgressDisplay, ProgressObserver, TerminalProgress,
    progress_percent,
};

// No module-local Result alias; signatures spell out `Result<T, DownloadError>`.
