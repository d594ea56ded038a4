//! Qualification filter: decides whether a catalog record is worth acquiring.
//!
//! Predicates run in a fixed order and stop at the first rejection:
//!
//! 1. title contains the query (case-sensitive)
//! 2. enough ratings
//! 3. high enough average rating
//! 4. ISBN present
//! 5. not already attempted
//! 6. no avoided keyword among the title tokens
//!
//! A record that passes all six is added to the attempted set right away,
//! before any search runs, so a crash mid-search never retries it.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::catalog::CatalogRecord;
use crate::state::{NamedSet, StateError, StateStore};
use crate::utils::compile_static_regex;

/// Default minimum number of ratings.
pub const DEFAULT_MIN_RATINGS_COUNT: u64 = 100;

/// Default minimum average rating.
pub const DEFAULT_MIN_AVERAGE_RATING: f64 = 3.5;

static TITLE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"[\s:'0-9]+"));

/// Why a record was not kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Title does not contain the query.
    NoTopicalMatch,
    /// Too few ratings.
    LowRatingCount,
    /// Average rating below the threshold.
    LowRating,
    /// No ISBN to search by.
    MissingIsbn,
    /// Identifier already in the attempted set.
    AlreadyAttempted,
    /// A title token is an avoided keyword.
    AvoidedKeyword(String),
}

impl RejectReason {
    /// Stable label, independent of the matched keyword.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoTopicalMatch => "no_topical_match",
            Self::LowRatingCount => "low_rating_count",
            Self::LowRating => "low_rating",
            Self::MissingIsbn => "missing_isbn",
            Self::AlreadyAttempted => "already_attempted",
            Self::AvoidedKeyword(_) => "avoided_keyword",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AvoidedKeyword(token) => write!(f, "avoided_keyword({token})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Outcome of [`QualificationFilter::qualify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The record qualifies and is now marked attempted.
    Keep,
    /// The record was skipped.
    Reject(RejectReason),
}

/// Numeric quality thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualificationThresholds {
    /// Minimum `ratings_count`, inclusive.
    pub min_ratings_count: u64,
    /// Minimum `average_rating`, inclusive.
    pub min_average_rating: f64,
}

impl Default for QualificationThresholds {
    fn default() -> Self {
        Self {
            min_ratings_count: DEFAULT_MIN_RATINGS_COUNT,
            min_average_rating: DEFAULT_MIN_AVERAGE_RATING,
        }
    }
}

/// Case-sensitive set of disqualifying title tokens, fixed for a run.
#[derive(Debug, Clone, Default)]
pub struct AvoidedKeywords {
    keywords: HashSet<String>,
}

impl AvoidedKeywords {
    /// Loads the avoided-keyword set from the store.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the store read fails.
    pub async fn load(store: &StateStore) -> Result<Self, StateError> {
        let keywords = store.members(NamedSet::AvoidedKeywords).await?;
        Ok(keywords.into_iter().collect())
    }

    /// Returns the first title token that is an avoided keyword.
    #[must_use]
    pub fn first_match<'a>(&self, title: &'a str) -> Option<&'a str> {
        title_tokens(title).find(|token| self.keywords.contains(*token))
    }

    /// Number of keywords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl FromIterator<String> for AvoidedKeywords {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keywords: iter.into_iter().collect(),
        }
    }
}

/// Splits a title on whitespace, colons, apostrophes and digit runs.
pub fn title_tokens(title: &str) -> impl Iterator<Item = &str> {
    TITLE_SPLIT_RE
        .split(title)
        .filter(|token| !token.is_empty())
}

/// The predicate chain plus its run-static inputs.
#[derive(Debug, Clone)]
pub struct QualificationFilter {
    thresholds: QualificationThresholds,
    avoided: AvoidedKeywords,
}

impl QualificationFilter {
    /// Creates a filter.
    #[must_use]
    pub fn new(thresholds: QualificationThresholds, avoided: AvoidedKeywords) -> Self {
        Self {
            thresholds,
            avoided,
        }
    }

    /// Applies the predicate chain to `record`.
    ///
    /// On [`Verdict::Keep`] the record identifier has already been added to
    /// the attempted set when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the attempted-set lookup or insert fails.
    #[instrument(skip(self, record, store), fields(id = %record.id))]
    pub async fn qualify(
        &self,
        record: &CatalogRecord,
        query: &str,
        store: &StateStore,
    ) -> Result<Verdict, StateError> {
        if let Some(reason) = self.check_record(record, query) {
            return Ok(Verdict::Reject(reason));
        }

        if store
            .is_member(NamedSet::AttemptedRecords, &record.id)
            .await?
        {
            return Ok(Verdict::Reject(RejectReason::AlreadyAttempted));
        }

        if let Some(token) = self.avoided.first_match(&record.title) {
            return Ok(Verdict::Reject(RejectReason::AvoidedKeyword(
                token.to_string(),
            )));
        }

        store
            .add_member(NamedSet::AttemptedRecords, &record.id)
            .await?;
        debug!("record qualified and marked attempted");
        Ok(Verdict::Keep)
    }

    /// Predicates 1-4, which need nothing but the record.
    fn check_record(&self, record: &CatalogRecord, query: &str) -> Option<RejectReason> {
        if !record.title.contains(query) {
            return Some(RejectReason::NoTopicalMatch);
        }
        if record.ratings_count < self.thresholds.min_ratings_count {
            return Some(RejectReason::LowRatingCount);
        }
        if record.average_rating < self.thresholds.min_average_rating {
            return Some(RejectReason::LowRating);
        }
        if record.isbn.as_deref().is_none_or(str::is_empty) {
            return Some(RejectReason::MissingIsbn);
        }
        None
    }
}
