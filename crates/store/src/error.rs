use simrec_ingest::IngestError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Inconsistent store: {reason}")]
    InconsistentStore {
        reason: String,
        /// Offending item index, when the mismatch is tied to one row.
        index: Option<usize>,
    },
}

impl StoreError {
    pub(crate) fn inconsistent(reason: impl Into<String>, index: Option<usize>) -> Self {
        Self::InconsistentStore {
            reason: reason.into(),
            index,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InconsistentStore { .. } => "inconsistent_store",
        }
    }
}

/// Anything that keeps the store from being built. Always fatal for the process.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoadError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Ingest(err) => err.code(),
            Self::Store(err) => err.code(),
        }
    }
}
