//! HTTP client wrapper for streaming book files to disk.
//!
//! The same underlying `reqwest::Client` is shared with the search index and
//! the link resolver, so one explicit proxy / timeout policy covers all
//! outbound traffic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Proxy};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use super::error::DownloadError;
use super::filename::resolve_unique_path;
use super::progress::{ProgressObserver, progress_percent};
use crate::user_agent;

/// Network settings for [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Bound on sending a request and receiving response headers.
    pub request_timeout: Duration,
    /// Explicit proxy for all traffic. `None` keeps reqwest's environment
    /// proxy handling.
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

/// Outcome of a completed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedFile {
    /// Where the bytes were written.
    pub path: PathBuf,
    /// Bytes written and flushed.
    pub bytes_written: u64,
    /// Total size declared by the response, when present.
    pub content_length: Option<u64>,
}

/// HTTP client for downloading files with streaming support.
///
/// Create once and pass to every component that makes requests.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    request_timeout: Duration,
}

impl HttpClient {
    /// Builds a client from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the proxy URL is invalid or
    /// the TLS backend cannot initialize.
    #[instrument(level = "debug", skip(settings), fields(proxy = settings.proxy.is_some()))]
    pub fn new(settings: &HttpSettings) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent());

        if let Some(proxy) = settings.proxy.as_deref() {
            let proxy = Proxy::all(proxy).map_err(|e| DownloadError::ClientBuild {
                reason: format!("invalid proxy '{proxy}': {e}"),
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| DownloadError::ClientBuild {
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            request_timeout: settings.request_timeout,
        })
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Streams `url` into `destination` without replacing existing files.
    ///
    /// Bytes go to a sibling `<destination>.part` file that is renamed into
    /// place only after it has been flushed. If `destination` is already
    /// taken, the file lands at the first free `_2`, `_3`, ... sibling and
    /// [`StreamedFile::path`] says where. On failure only the `.part` file
    /// is removed.
    ///
    /// `progress` receives a percentage after each chunk when the response
    /// declares its length.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request phase fails or exceeds the request timeout
    /// - The server returns an error status (4xx, 5xx)
    /// - The body stream breaks (`Network`)
    /// - Creating, writing or renaming the file fails (`Storage`)
    #[instrument(skip(self, progress), fields(url = %url, path = %destination.display()))]
    pub async fn stream_to_path(
        &self,
        url: &str,
        destination: &Path,
        progress: &dyn ProgressObserver,
    ) -> Result<StreamedFile, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.send_get(url).await?;
        let content_length = response.content_length();
        debug!(?content_length, "response headers received");

        let partial = partial_path(destination);
        let file = File::create(&partial)
            .await
            .map_err(|e| DownloadError::storage(partial.clone(), e))?;

        let bytes_written =
            match stream_to_file(file, response, url, &partial, content_length, progress).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    debug!(path = %partial.display(), "cleaning up partial file after error");
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(error);
                }
            };

        let final_path = resolve_unique_path(destination);
        if final_path != destination {
            info!(
                taken = %destination.display(),
                path = %final_path.display(),
                "destination exists, keeping both files"
            );
        }
        if let Err(e) = tokio::fs::rename(&partial, &final_path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DownloadError::storage(final_path, e));
        }

        info!(
            path = %final_path.display(),
            bytes = bytes_written,
            "download complete"
        );
        Ok(StreamedFile {
            path: final_path,
            bytes_written,
            content_length,
        })
    }

    /// Sends a GET bounded by the request timeout; the body is left to the
    /// caller.
    async fn send_get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = tokio::time::timeout(self.request_timeout, self.client.get(url).send())
            .await
            .map_err(|_| DownloadError::timeout(url))?
            .map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url)
                } else {
                    DownloadError::network(url, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

/// Staging path for an in-flight download: `<destination>.part`.
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    content_length: Option<u64>,
    progress: &dyn ProgressObserver,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::storage(file_path, e))?;

        bytes_written += chunk.len() as u64;
        if let Some(percent) = progress_percent(bytes_written, content_length) {
            progress.on_progress(percent);
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::storage(file_path, e))?;

    Ok(bytes_written)
}
