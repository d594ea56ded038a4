//! Per-candidate download: resolve the link, then stream the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::client::HttpClient;
use super::error::DownloadError;
use super::link::LinkResolver;
use super::progress::ProgressDisplay;
use crate::search::FileCandidate;

/// A file that finished streaming and was flushed to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Destination path.
    pub path: PathBuf,
    /// URL the bytes came from.
    pub url: String,
    /// Bytes written.
    pub bytes: u64,
}

/// Downloads selected candidates one at a time.
pub struct DownloadManager {
    client: HttpClient,
    links: Arc<dyn LinkResolver>,
    progress: ProgressDisplay,
}

impl DownloadManager {
    /// Creates a manager streaming through `client` and resolving links with
    /// `links`.
    #[must_use]
    pub fn new(client: HttpClient, links: Arc<dyn LinkResolver>, progress: ProgressDisplay) -> Self {
        Self {
            client,
            links,
            progress,
        }
    }

    /// Downloads `candidate` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for this candidate only. Callers move on to
    /// the next candidate.
    #[instrument(skip(self, candidate), fields(md5 = %candidate.content_id, format = %candidate.format))]
    pub async fn download(
        &self,
        candidate: &FileCandidate,
        destination: &Path,
    ) -> Result<DownloadedFile, DownloadError> {
        let url = self.links.resolve(&candidate.content_id).await?;
        info!(url = %url, path = %destination.display(), "downloading");

        let label = destination
            .file_name()
            .map_or_else(|| candidate.content_id.clone(), |n| n.to_string_lossy().into_owned());
        let observer = self.progress.observer(&label);

        match self
            .client
            .stream_to_path(&url, destination, observer.as_ref())
            .await
        {
            Ok(streamed) => {
                observer.on_finish(true);
                if let Some(expected) = streamed.content_length
                    && expected != streamed.bytes_written
                {
                    warn!(
                        expected,
                        written = streamed.bytes_written,
                        "content length mismatch"
                    );
                }
                Ok(DownloadedFile {
                    path: streamed.path,
                    url,
                    bytes: streamed.bytes_written,
                })
            }
            Err(error) => {
                observer.on_finish(false);
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("links", &self.links.name())
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}
