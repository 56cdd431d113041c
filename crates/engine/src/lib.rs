//! # Simrec Engine
//!
//! Maps a selected title to its top-K most similar items.
//!
//! ```text
//! title ──> resolve_index ──> row_for ──> drop self ──> rank (score desc, index asc)
//!                                                         └─> take k, skipping corrupt indices
//! ```

mod error;
mod handle;
mod recommend;

pub use error::{MissingRowReason, RecommendError, Result};
pub use handle::StoreHandle;
pub use recommend::{
    recommend, RecommendedItem, Recommendations, SkippedCandidate, DEFAULT_TOP_K,
};

/// Recommendation entry point for adapters: a store handle plus the configured default `k`.
#[derive(Debug, Clone)]
pub struct Engine {
    handle: StoreHandle,
    default_k: usize,
}

impl Engine {
    #[must_use]
    pub const fn new(handle: StoreHandle, default_k: usize) -> Self {
        Self { handle, default_k }
    }

    pub fn recommend(&self, title: &str, k: Option<usize>) -> Result<Recommendations> {
        let store = self.handle.snapshot();
        recommend(&store, title, k.unwrap_or(self.default_k))
    }

    #[must_use]
    pub const fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    #[must_use]
    pub const fn default_k(&self) -> usize {
        self.default_k
    }
}
