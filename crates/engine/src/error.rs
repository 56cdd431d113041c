use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRowReason {
    /// No row is stored for the selected index.
    Absent,
    /// A row exists but every candidate in it points outside the catalog.
    AllCandidatesCorrupt { skipped: usize },
}

impl fmt::Display for MissingRowReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("no similarity row stored for this item"),
            Self::AllCandidatesCorrupt { skipped } => write!(
                f,
                "all {skipped} ranked candidates point outside the catalog"
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecommendError {
    #[error("Item not found: '{title}'")]
    ItemNotFound { title: String },

    #[error("Missing similarity row for item {index}: {reason}")]
    MissingSimilarityRow {
        index: usize,
        reason: MissingRowReason,
    },
}

impl RecommendError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ItemNotFound { .. } => "item_not_found",
            Self::MissingSimilarityRow { .. } => "missing_similarity_row",
        }
    }

    /// Bad input from the caller, as opposed to a data-integrity problem.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::ItemNotFound { .. })
    }
}
