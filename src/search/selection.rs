//! File selection across a record's search results.

use tracing::trace;

use super::{FileCandidate, FileFormat};

/// Largest file size accepted, in bytes.
pub const DEFAULT_SIZE_CEILING_BYTES: u64 = 20_000_000;

/// Picks at most one EPUB and one PDF from `candidates`.
///
/// `candidates` must be ascending by size. They are walked from the largest
/// down; anything over `size_ceiling` is skipped, and the first EPUB and
/// first PDF seen fill their slot. The walk stops as soon as both slots are
/// filled. So each pick is the largest file of its format under the
/// ceiling, not the smallest.
///
/// Returned candidates are in walk order.
#[must_use]
pub fn select_candidates(candidates: &[FileCandidate], size_ceiling: u64) -> Vec<&FileCandidate> {
    let mut epub_chosen = false;
    let mut pdf_chosen = false;
    let mut selected = Vec::with_capacity(2);

    for candidate in candidates.iter().rev() {
        if epub_chosen && pdf_chosen {
            break;
        }
        if candidate.size_bytes > size_ceiling {
            trace!(size = candidate.size_bytes, "candidate over size ceiling");
            continue;
        }
        match candidate.format {
            FileFormat::Epub if !epub_chosen => epub_chosen = true,
            FileFormat::Pdf if !pdf_chosen => pdf_chosen = true,
            _ => continue,
        }
        selected.push(candidate);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::sort_by_size;

    const MB: u64 = 1_000_000;

    fn candidate(format: FileFormat, size: u64, id: &str) -> FileCandidate {
        FileCandidate::new(format, size, id)
    }

    #[test]
    fn test_selection_prefers_largest_under_ceiling_per_format() {
        let mut candidates = vec![
            candidate(FileFormat::Epub, 5 * MB, "epub-5"),
            candidate(FileFormat::Epub, 25 * MB, "epub-25"),
            candidate(FileFormat::Pdf, 3 * MB, "pdf-3"),
            candidate(FileFormat::Pdf, 18 * MB, "pdf-18"),
        ];
        sort_by_size(&mut candidates);

        let picked: Vec<&str> = select_candidates(&candidates, DEFAULT_SIZE_CEILING_BYTES)
            .into_iter()
            .map(|c| c.content_id.as_str())
            .collect();
        assert_eq!(picked, vec!["pdf-18", "epub-5"]);
    }

    #[test]
    fn test_selection_ceiling_is_inclusive() {
        let candidates = vec![candidate(
            FileFormat::Epub,
            DEFAULT_SIZE_CEILING_BYTES,
            "exact",
        )];
        assert_eq!(
            select_candidates(&candidates, DEFAULT_SIZE_CEILING_BYTES).len(),
            1
        );
    }

    #[test]
    fn test_selection_ignores_other_formats_and_duplicates() {
        let candidates = vec![
            candidate(FileFormat::Epub, MB, "epub-small"),
            candidate(FileFormat::Other("mobi".to_string()), 2 * MB, "mobi"),
            candidate(FileFormat::Epub, 3 * MB, "epub-large"),
        ];
        let picked: Vec<&str> = select_candidates(&candidates, DEFAULT_SIZE_CEILING_BYTES)
            .into_iter()
            .map(|c| c.content_id.as_str())
            .collect();
        assert_eq!(picked, vec!["epub-large"]);
    }

    #[test]
    fn test_selection_all_over_ceiling_yields_nothing() {
        let candidates = vec![
            candidate(FileFormat::Pdf, 21 * MB, "a"),
            candidate(FileFormat::Epub, 40 * MB, "b"),
        ];
        assert!(select_candidates(&candidates, DEFAULT_SIZE_CEILING_BYTES).is_empty());
    }

    #[test]
    fn test_selection_empty_input() {
        assert!(select_candidates(&[], DEFAULT_SIZE_CEILING_BYTES).is_empty());
    }

    #[test]
    fn test_selection_respects_custom_ceiling() {
        let candidates = vec![
            candidate(FileFormat::Pdf, 2 * MB, "small"),
            candidate(FileFormat::Pdf, 8 * MB, "large"),
        ];
        let picked = select_candidates(&candidates, 5 * MB);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].content_id, "small");
    }
}
