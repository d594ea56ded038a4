//! Library Genesis index client.
//!
//! A search is two requests: the `search.php` result page (identifier
//! column, sorted by file size ascending) to collect row ids, then
//! `json.php` to fetch extension, size and MD5 for those ids.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{BookIndex, FileCandidate, FileFormat, SearchError, sort_by_size};
use crate::utils::compile_static_regex;

/// Default search mirror.
pub const DEFAULT_SEARCH_MIRROR: &str = "http://libgen.is";

const SEARCH_TIMEOUT_SECS: u64 = 30;
const MAX_RESULTS: &str = "100";
const JSON_FIELDS: &str = "id,title,extension,filesize,md5";

static RESULT_ROW_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<tr[^>]*valign\s*=\s*["']?top["']?[^>]*>\s*<td[^>]*>\s*(\d+)\s*</td>"#)
});

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeField {
    Number(u64),
    Text(String),
}

impl SizeField {
    fn bytes(&self) -> Option<u64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    #[serde(default)]
    extension: String,
    filesize: SizeField,
    #[serde(default)]
    md5: String,
}

/// [`BookIndex`] backed by a Library Genesis mirror.
pub struct LibgenIndex {
    client: Client,
    mirror: Url,
    timeout: Duration,
}

impl LibgenIndex {
    /// Creates an index client for `mirror` sharing `client`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidMirror`] when `mirror` is not an
    /// absolute URL.
    pub fn new(client: Client, mirror: &str) -> Result<Self, SearchError> {
        let mut normalized = mirror.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let mirror = Url::parse(&normalized).map_err(|_| SearchError::InvalidMirror {
            url: mirror.to_string(),
        })?;
        Ok(Self {
            client,
            mirror,
            timeout: Duration::from_secs(SEARCH_TIMEOUT_SECS),
        })
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, SearchError> {
        self.mirror
            .join(path)
            .map_err(|_| SearchError::InvalidMirror {
                url: self.mirror.to_string(),
            })
    }

    fn search_url(&self, isbn: &str) -> Result<Url, SearchError> {
        let mut url = self.endpoint("search.php")?;
        url.query_pairs_mut()
            .append_pair("req", isbn)
            .append_pair("open", "0")
            .append_pair("res", MAX_RESULTS)
            .append_pair("view", "simple")
            .append_pair("phase", "1")
            .append_pair("column", "identifier")
            .append_pair("sort", "filesize")
            .append_pair("sortmode", "ASC");
        Ok(url)
    }

    fn details_url(&self, ids: &[String]) -> Result<Url, SearchError> {
        let mut url = self.endpoint("json.php")?;
        url.query_pairs_mut()
            .append_pair("ids", &ids.join(","))
            .append_pair("fields", JSON_FIELDS);
        Ok(url)
    }

    async fn get_text(&self, url: &Url) -> Result<String, SearchError> {
        let response = self
            .client
            .get(url.as_str())
            .header(ACCEPT, "text/html,application/json;q=0.9,*/*;q=0.8")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SearchError::transport(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::http_status(url.as_str(), status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| SearchError::transport(url.as_str(), e))
    }
}

impl std::fmt::Debug for LibgenIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibgenIndex")
            .field("mirror", &self.mirror.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BookIndex for LibgenIndex {
    fn name(&self) -> &'static str {
        "libgen"
    }

    #[instrument(skip(self), fields(index = "libgen", isbn = %isbn))]
    async fn search(&self, isbn: &str) -> Result<Vec<FileCandidate>, SearchError> {
        let search_url = self.search_url(isbn)?;
        let page = self.get_text(&search_url).await?;
        let ids = extract_result_ids(&page);
        debug!(results = ids.len(), "search page parsed");
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let details_url = self.details_url(&ids)?;
        let body = self.get_text(&details_url).await?;
        let entries: Vec<IndexEntry> = serde_json::from_str(&body)
            .map_err(|e| SearchError::malformed(details_url.as_str(), e.to_string()))?;

        let mut candidates: Vec<FileCandidate> = entries
            .into_iter()
            .filter_map(|entry| {
                let Some(size) = entry.filesize.bytes() else {
                    debug!(md5 = %entry.md5, "dropping entry with unreadable size");
                    return None;
                };
                if entry.md5.trim().is_empty() {
                    debug!("dropping entry without md5");
                    return None;
                }
                Some(FileCandidate::new(
                    FileFormat::from_extension(&entry.extension),
                    size,
                    entry.md5.trim(),
                ))
            })
            .collect();
        sort_by_size(&mut candidates);
        Ok(candidates)
    }
}

/// Collects result row ids from a search page, in page order, without
/// duplicates.
fn extract_result_ids(page: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for captures in RESULT_ROW_ID_RE.captures_iter(page) {
        if let Some(id) = captures.get(1).map(|m| m.as_str().to_string())
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    }
    ids
}
