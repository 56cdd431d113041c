//! # Simrec Store
//!
//! The catalog and similarity table, loaded once and checked against each other.
//!
//! - [`Catalog`]: ordered items, indexed by load position, looked up by title (first match wins).
//! - [`SimilarityTable`]: dense matrix or sparse index-keyed rows behind one
//!   [`SimilarityTable::row_for`] accessor.
//! - [`Store::build`]: size validation; any disagreement is [`StoreError::InconsistentStore`].
//! - [`load_store`]: fetch + decode + build in one step; [`reload_store`] refetches drive sources.

mod catalog;
mod error;
mod loader;
mod similarity;
mod store;

pub use catalog::{Catalog, Item};
pub use error::{LoadError, Result, StoreError};
pub use loader::{load_store, reload_store, LoadConfig};
pub use similarity::{Row, RowIter, SimilarityLayout, SimilarityTable, SparseRow};
pub use store::Store;
