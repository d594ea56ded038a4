//! Small helpers shared across modules.

use regex::Regex;
use url::Url;

/// Compiles a regex pattern known to be valid at build time.
///
/// # Panics
///
/// Panics if `pattern` is invalid. Only call with literal patterns.
#[must_use]
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Resolves `href` against `base`, returning `None` when either does not
/// form a valid absolute URL.
#[must_use]
pub(crate) fn absolutize_url(href: &str, base: &str) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(absolute) = Url::parse(trimmed) {
        return Some(absolute.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(trimmed).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize_relative_href_against_base() {
        assert_eq!(
            absolutize_url("get.php?md5=abc&key=K", "http://libgen.li/").as_deref(),
            Some("http://libgen.li/get.php?md5=abc&key=K")
        );
    }

    #[test]
    fn test_absolutize_keeps_absolute_href() {
        assert_eq!(
            absolutize_url("https://cdn.example.org/f.epub", "http://libgen.li/").as_deref(),
            Some("https://cdn.example.org/f.epub")
        );
    }

    #[test]
    fn test_absolutize_empty_href_is_none() {
        assert_eq!(absolutize_url("  ", "http://libgen.li/"), None);
    }
}
