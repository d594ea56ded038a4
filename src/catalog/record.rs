//! Catalog record model and line parsing.
//!
//! Each catalog line is a standalone JSON object in the Goodreads books dump
//! shape. Numeric fields show up both as JSON numbers and as numeric
//! strings (`"ratings_count": "312"`), so parsing goes through a small
//! scalar intermediate.

use serde::Deserialize;
use thiserror::Error;

/// One book entry read from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    /// Unique, opaque record identifier.
    pub id: String,
    /// Book title, used for topical matching and file naming.
    pub title: String,
    /// ISBN, absent when the catalog line carries none or an empty string.
    pub isbn: Option<String>,
    /// Number of ratings.
    pub ratings_count: u64,
    /// Average rating on a 0-5 scale.
    pub average_rating: f64,
    /// Publication year when known.
    pub publication_year: Option<i32>,
}

/// Why a catalog line could not be turned into a [`CatalogRecord`].
#[derive(Debug, Error)]
pub enum RecordError {
    /// The line is empty or whitespace only.
    #[error("blank catalog line")]
    Blank,

    /// The line is not a JSON object of the expected shape.
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The line is not valid UTF-8.
    #[error("catalog line is not valid UTF-8")]
    Encoding,

    /// A required field is missing or empty.
    #[error("catalog record is missing `{0}`")]
    MissingField(&'static str),

    /// A numeric field holds something that is not a number.
    #[error("catalog field `{field}` is not a valid number: {value:?}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Raw value as found on the line.
        value: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default, alias = "id")]
    book_id: Option<Scalar>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    isbn: Option<Scalar>,
    #[serde(default)]
    ratings_count: Option<Scalar>,
    #[serde(default)]
    average_rating: Option<Scalar>,
    #[serde(default)]
    publication_year: Option<Scalar>,
}

/// Parses one catalog line.
///
/// # Errors
///
/// Returns [`RecordError`] for blank lines, invalid JSON, a missing
/// identifier or title, or a numeric field that does not parse.
pub fn parse_record(line: &str) -> Result<CatalogRecord, RecordError> {
    if line.trim().is_empty() {
        return Err(RecordError::Blank);
    }
    let raw: RawRecord = serde_json::from_str(line)?;

    let id = raw
        .book_id
        .map(Scalar::into_text)
        .filter(|id| !id.is_empty())
        .ok_or(RecordError::MissingField("book_id"))?;
    let title = raw
        .title
        .filter(|title| !title.trim().is_empty())
        .ok_or(RecordError::MissingField("title"))?;
    let isbn = raw
        .isbn
        .map(Scalar::into_text)
        .filter(|isbn| !isbn.is_empty());

    let ratings_count = parse_number::<u64>("ratings_count", raw.ratings_count)?.unwrap_or(0);
    let average_rating = parse_number::<f64>("average_rating", raw.average_rating)?.unwrap_or(0.0);
    let publication_year = parse_number::<i32>("publication_year", raw.publication_year)?;

    Ok(CatalogRecord {
        id,
        title,
        isbn,
        ratings_count,
        average_rating,
        publication_year,
    })
}

/// Absent and empty values both read as `None`.
fn parse_number<T: std::str::FromStr>(
    field: &'static str,
    value: Option<Scalar>,
) -> Result<Option<T>, RecordError> {
    let Some(text) = value.map(Scalar::into_text) else {
        return Ok(None);
    };
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<T>()
        .map(Some)
        .map_err(|_| RecordError::InvalidNumber { field, value: text })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_goodreads_string_fields() {
        let line = r#"{"isbn": "0312853122", "ratings_count": "3", "average_rating": "4.00", "publication_year": "1984", "book_id": "5333265", "title": "W.C. Fields: A Life on Film"}"#;
        let record = parse_record(line).unwrap();
        assert_eq!(record.id, "5333265");
        assert_eq!(record.title, "W.C. Fields: A Life on Film");
        assert_eq!(record.isbn.as_deref(), Some("0312853122"));
        assert_eq!(record.ratings_count, 3);
        assert!((record.average_rating - 4.0).abs() < f64::EPSILON);
        assert_eq!(record.publication_year, Some(1984));
    }

    #[test]
    fn test_parse_record_numeric_fields() {
        let line = r#"{"book_id": 17, "title": "Foo Two", "isbn": "123", "ratings_count": 200, "average_rating": 4.0, "publication_year": 2001}"#;
        let record = parse_record(line).unwrap();
        assert_eq!(record.id, "17");
        assert_eq!(record.ratings_count, 200);
        assert_eq!(record.publication_year, Some(2001));
    }

    #[test]
    fn test_parse_record_empty_isbn_and_year_are_absent() {
        let line = r#"{"book_id": "1", "title": "Foo", "isbn": "", "ratings_count": "120", "average_rating": "3.9", "publication_year": ""}"#;
        let record = parse_record(line).unwrap();
        assert_eq!(record.isbn, None);
        assert_eq!(record.publication_year, None);
    }

    #[test]
    fn test_parse_record_missing_counts_default_to_zero() {
        let record = parse_record(r#"{"book_id": "1", "title": "Foo"}"#).unwrap();
        assert_eq!(record.ratings_count, 0);
        assert!(record.average_rating.abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_record_missing_title_is_error() {
        let result = parse_record(r#"{"book_id": "1", "isbn": "9"}"#);
        assert!(matches!(result, Err(RecordError::MissingField("title"))));
    }

    #[test]
    fn test_parse_record_missing_identifier_is_error() {
        let result = parse_record(r#"{"title": "Foo"}"#);
        assert!(matches!(result, Err(RecordError::MissingField("book_id"))));
    }

    #[test]
    fn test_parse_record_non_numeric_count_is_error() {
        let result = parse_record(r#"{"book_id": "1", "title": "Foo", "ratings_count": "lots"}"#);
        match result {
            Err(RecordError::InvalidNumber { field, value }) => {
                assert_eq!(field, "ratings_count");
                assert_eq!(value, "lots");
            }
            other => panic!("Expected InvalidNumber, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_record_truncated_json_is_error() {
        assert!(matches!(
            parse_record(r#"{"book_id": "1", "title": "Fo"#),
            Err(RecordError::Json(_))
        ));
    }

    #[test]
    fn test_parse_record_blank_line_is_error() {
        assert!(matches!(parse_record("   "), Err(RecordError::Blank)));
    }
}
