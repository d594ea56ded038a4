//! Destination filename derivation for downloaded books.

use std::path::{Path, PathBuf};

/// First duplicate suffix, so the second copy of `Foo.epub` is `Foo_2.epub`.
const DUPLICATE_SUFFIX_START: usize = 2;

/// Sanitizes a title for use as a filename stem.
///
/// Colons become `" -"`. Other characters invalid on common filesystems
/// (`/ \ * ? " < > |`, control characters) become `_`. Trailing dots and
/// spaces are trimmed since Windows drops them.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let replaced = title.replace(':', " -");
    let sanitized: String = replaced
        .chars()
        .map(|c| match c {
            '/' | '\\' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim().trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds `"<title> (<year>).<ext>"`, or `"<title>.<ext>"` without a year.
#[must_use]
pub fn book_filename(title: &str, publication_year: Option<i32>, extension: &str) -> String {
    let stem = sanitize_title(title);
    match publication_year {
        Some(year) => format!("{stem} ({year}).{extension}"),
        None => format!("{stem}.{extension}"),
    }
}

/// Returns `path` if nothing exists there, otherwise the first free
/// `<stem>_<n>.<ext>` sibling starting at `_2`.
#[must_use]
pub fn resolve_unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map_or_else(|| "download".to_string(), |s| s.to_string_lossy().into_owned());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for i in DUPLICATE_SUFFIX_START..1000 {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    // Fallback (extremely unlikely)
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}
