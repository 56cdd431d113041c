use crate::catalog::{Catalog, Item};
use crate::error::{Result, StoreError};
use crate::similarity::{Row, SimilarityLayout, SimilarityTable, SparseRow};

/// Catalog plus similarity table, validated against each other once at build time.
///
/// Immutable after [`Store::build`]; share it behind an `Arc`.
#[derive(Debug)]
pub struct Store {
    catalog: Catalog,
    similarity: SimilarityTable,
}

impl Store {
    pub fn build(catalog: Catalog, similarity: SimilarityTable) -> Result<Self> {
        let n = catalog.len();
        if n == 0 {
            return Err(StoreError::inconsistent("catalog is empty", None));
        }

        match &similarity {
            SimilarityTable::Dense(rows) => {
                if rows.len() != n {
                    return Err(StoreError::inconsistent(
                        format!(
                            "catalog has {n} items but similarity matrix has {} rows",
                            rows.len()
                        ),
                        None,
                    ));
                }
                for (index, row) in rows.iter().enumerate() {
                    check_row_len(index, row.len(), n)?;
                }
            }
            SimilarityTable::Sparse(rows) => {
                for (&index, row) in rows {
                    if index >= n {
                        return Err(StoreError::inconsistent(
                            format!("similarity row {index} is outside the catalog (size {n})"),
                            Some(index),
                        ));
                    }
                    if let SparseRow::Scores(scores) = row {
                        check_row_len(index, scores.len(), n)?;
                    }
                }
                if rows.len() < n {
                    log::warn!(
                        "Similarity table covers {} of {n} items; the rest will report missing rows",
                        rows.len()
                    );
                }
            }
        }

        log::info!(
            "Store ready: {n} items, {} similarity rows ({})",
            similarity.row_count(),
            similarity.layout()
        );
        Ok(Self {
            catalog,
            similarity,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    #[must_use]
    pub fn resolve_index(&self, title: &str) -> Option<usize> {
        self.catalog.resolve_index(title)
    }

    /// Row for `index`, or `None` when the index is outside the catalog or has no row.
    #[must_use]
    pub fn row_for(&self, index: usize) -> Option<Row<'_>> {
        if index >= self.catalog.len() {
            return None;
        }
        self.similarity.row_for(index)
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<&Item> {
        self.catalog.get(index)
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.catalog.titles()
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn similarity(&self) -> &SimilarityTable {
        &self.similarity
    }

    #[must_use]
    pub const fn layout(&self) -> SimilarityLayout {
        self.similarity.layout()
    }
}

fn check_row_len(index: usize, len: usize, n: usize) -> Result<()> {
    if len != n {
        return Err(StoreError::inconsistent(
            format!("similarity row {index} has {len} scores, catalog has {n} items"),
            Some(index),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn catalog(n: usize) -> Catalog {
        Catalog::from_entries((0..n).map(|i| (format!("item-{i}"), format!("{i}.jpg"))))
    }

    #[test]
    fn builds_when_sizes_match() {
        let store = Store::build(
            catalog(2),
            SimilarityTable::Dense(vec![vec![1.0, 0.2], vec![0.2, 1.0]]),
        )
        .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.resolve_index("item-1"), Some(1));
        assert_eq!(store.row_for(0).unwrap().len(), 2);
        assert!(store.row_for(2).is_none());
    }

    #[test]
    fn short_row_is_inconsistent() {
        let err = Store::build(
            catalog(4),
            SimilarityTable::Dense(vec![
                vec![1.0, 0.9, 0.9, 0.1],
                vec![0.9, 1.0, 0.2],
                vec![0.9, 0.2, 1.0, 0.3],
                vec![0.1, 0.2, 0.3, 1.0],
            ]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InconsistentStore { index: Some(1), .. }
        ));
        assert_eq!(err.code(), "inconsistent_store");
    }

    #[test]
    fn row_count_mismatch_is_inconsistent() {
        let err = Store::build(catalog(3), SimilarityTable::Dense(vec![vec![1.0; 3]; 2]))
            .unwrap_err();
        assert!(err.to_string().contains("3 items but similarity matrix has 2 rows"));
    }

    #[test]
    fn empty_catalog_is_inconsistent() {
        let err = Store::build(catalog(0), SimilarityTable::Dense(Vec::new())).unwrap_err();
        assert!(err.to_string().contains("catalog is empty"));
    }

    #[test]
    fn sparse_tables_may_be_partial_but_not_out_of_domain() {
        let mut rows = BTreeMap::new();
        rows.insert(0, SparseRow::Scores(vec![1.0, 0.5, 0.25]));
        rows.insert(2, SparseRow::Pairs(vec![(0, 0.3), (7, 0.9)]));
        let store = Store::build(catalog(3), SimilarityTable::Sparse(rows.clone())).unwrap();
        assert!(store.row_for(1).is_none());
        assert_eq!(store.row_for(2).unwrap().len(), 2);

        rows.insert(3, SparseRow::Scores(vec![0.0; 3]));
        let err = Store::build(catalog(3), SimilarityTable::Sparse(rows)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InconsistentStore { index: Some(3), .. }
        ));
    }

    #[test]
    fn sparse_positional_rows_must_cover_the_catalog() {
        let mut rows = BTreeMap::new();
        rows.insert(1, SparseRow::Scores(vec![1.0, 0.5]));
        let err = Store::build(catalog(3), SimilarityTable::Sparse(rows)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InconsistentStore { index: Some(1), .. }
        ));
    }
}
