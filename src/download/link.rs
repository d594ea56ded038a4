//! Resolution of a candidate's content id to a retrievable file URL.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::constants::LINK_PAGE_TIMEOUT_SECS;
use super::error::DownloadError;
use crate::utils::{absolutize_url, compile_static_regex};

/// Default download mirror.
pub const DEFAULT_DOWNLOAD_MIRROR: &str = "http://libgen.li";

static MAIN_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<table[^>]*\bid\s*=\s*["']?main["']?[^>]*>(.*?)</table>"#)
});

static ANCHOR_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
});

/// Single-hop link resolution collaborator.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Resolves `content_id` to an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::LinkResolution`] when the page lacks the
    /// expected link, or a transport error when the page cannot be fetched.
    async fn resolve(&self, content_id: &str) -> Result<String, DownloadError>;
}

/// Resolver for the `ads.php` landing page of a Library Genesis mirror.
pub struct LibgenAdsLinkResolver {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl LibgenAdsLinkResolver {
    /// Creates a resolver for `base` sharing `client`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] when `base` is not absolute.
    pub fn new(client: Client, base: &str) -> Result<Self, DownloadError> {
        let mut normalized = base.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized).map_err(|_| DownloadError::invalid_url(base))?;
        Ok(Self {
            client,
            base,
            timeout: Duration::from_secs(LINK_PAGE_TIMEOUT_SECS),
        })
    }

    /// Overrides the landing page timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn page_url(&self, content_id: &str) -> Result<Url, DownloadError> {
        let mut url = self
            .base
            .join("ads.php")
            .map_err(|_| DownloadError::invalid_url(self.base.as_str()))?;
        url.query_pairs_mut()
            .append_pair("md5", &content_id.to_ascii_lowercase());
        Ok(url)
    }
}

impl std::fmt::Debug for LibgenAdsLinkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibgenAdsLinkResolver")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LinkResolver for LibgenAdsLinkResolver {
    fn name(&self) -> &'static str {
        "libgen-ads"
    }

    #[instrument(skip(self), fields(resolver = "libgen-ads"))]
    async fn resolve(&self, content_id: &str) -> Result<String, DownloadError> {
        let url = self.page_url(content_id)?;
        let response = self
            .client
            .get(url.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url.as_str())
                } else {
                    DownloadError::network(url.as_str(), e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }
        let page = response
            .text()
            .await
            .map_err(|e| DownloadError::network(url.as_str(), e))?;

        let href = extract_main_table_link(&page).ok_or_else(|| {
            DownloadError::link_resolution(content_id, "no anchor inside the main table")
        })?;
        let resolved = absolutize_url(&href, url.as_str()).ok_or_else(|| {
            DownloadError::link_resolution(content_id, format!("unusable href '{href}'"))
        })?;
        debug!(url = %resolved, "download link resolved");
        Ok(resolved)
    }
}

/// Returns the first anchor `href` inside `<table id="main">`.
fn extract_main_table_link(page: &str) -> Option<String> {
    let table = MAIN_TABLE_RE.captures(page)?.get(1)?.as_str();
    let captures = ANCHOR_HREF_RE.captures(table)?;
    let href = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))?
        .as_str();
    Some(href.replace("&amp;", "&"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    const ADS_PAGE: &str = r#"<html><body>
        <a href="/index.php">home</a>
        <table id="main" border=0><tr><td>
        <h2><a href="get.php?md5=abc123&amp;key=XYZ">GET</a></h2>
        <a href="other.php">mirror 2</a>
        </td></tr></table>
        </body></html>"#;

    #[test]
    fn test_extract_main_table_link_takes_first_anchor_in_table() {
        assert_eq!(
            extract_main_table_link(ADS_PAGE).as_deref(),
            Some("get.php?md5=abc123&key=XYZ")
        );
    }

    #[test]
    fn test_extract_main_table_link_ignores_anchors_outside_table() {
        let page = r#"<a href="/outside">x</a><table id=other><a href="nope">n</a></table>"#;
        assert_eq!(extract_main_table_link(page), None);
    }

    #[test]
    fn test_extract_main_table_link_unquoted_href() {
        let page = "<table id=main><td><a href=get.php?md5=f>GET</a></td></table>";
        assert_eq!(
            extract_main_table_link(page).as_deref(),
            Some("get.php?md5=f")
        );
    }

    #[test]
    fn test_page_url_lowercases_md5() {
        let resolver = LibgenAdsLinkResolver::new(Client::new(), "http://libgen.li").unwrap();
        let url = resolver.page_url("ABC123").unwrap();
        assert_eq!(url.as_str(), "http://libgen.li/ads.php?md5=abc123");
    }

    #[tokio::test]
    async fn test_resolve_returns_absolute_url() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/ads.php"))
            .and(query_param("md5", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ADS_PAGE))
            .mount(&mock_server)
            .await;

        let resolver = LibgenAdsLinkResolver::new(Client::new(), &mock_server.uri()).unwrap();
        let resolved = resolver.resolve("ABC123").await.unwrap();
        assert_eq!(
            resolved,
            format!("{}/get.php?md5=abc123&key=XYZ", mock_server.uri())
        );
    }

    #[tokio::test]
    async fn test_resolve_missing_link_is_link_resolution_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/ads.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>File not found</p>"))
            .mount(&mock_server)
            .await;

        let resolver = LibgenAdsLinkResolver::new(Client::new(), &mock_server.uri()).unwrap();
        match resolver.resolve("dead").await {
            Err(DownloadError::LinkResolution { content_id, .. }) => {
                assert_eq!(content_id, "dead");
            }
            other => panic!("Expected LinkResolution error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_server_error_maps_to_http_status() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/ads.php"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let resolver = LibgenAdsLinkResolver::new(Client::new(), &mock_server.uri()).unwrap();
        assert!(matches!(
            resolver.resolve("abc").await,
            Err(DownloadError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_honors_configured_page_timeout() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/ads.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(ADS_PAGE)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let resolver = LibgenAdsLinkResolver::new(Client::new(), &mock_server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(200));
        assert!(matches!(
            resolver.resolve("abc").await,
            Err(DownloadError::Timeout { .. })
        ));
    }
}
