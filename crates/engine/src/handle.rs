use arc_swap::ArcSwap;
use simrec_store::Store;
use std::sync::Arc;

/// Shared pointer to the current [`Store`].
///
/// Readers take a snapshot and keep using it for the whole request; a reload installs a new
/// store with a single atomic swap, so nobody observes a half-built table.
#[derive(Clone)]
pub struct StoreHandle {
    current: Arc<ArcSwap<Store>>,
}

impl StoreHandle {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(store)),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Store> {
        self.current.load_full()
    }

    /// Installs `store` and returns the one it replaced.
    pub fn swap(&self, store: Store) -> Arc<Store> {
        let previous = self.current.swap(Arc::new(store));
        log::info!(
            "Swapped store: {} -> {} items",
            previous.len(),
            self.current.load().len()
        );
        previous
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("items", &self.current.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simrec_store::{Catalog, SimilarityTable};

    fn store(n: usize) -> Store {
        let catalog = Catalog::from_entries((0..n).map(|i| (i.to_string(), String::new())));
        Store::build(catalog, SimilarityTable::Dense(vec![vec![0.0; n]; n])).unwrap()
    }

    #[test]
    fn snapshots_survive_a_swap() {
        let handle = StoreHandle::new(store(2));
        let before = handle.snapshot();
        let previous = handle.swap(store(3));

        assert_eq!(before.len(), 2);
        assert_eq!(previous.len(), 2);
        assert_eq!(handle.snapshot().len(), 3);
        assert_eq!(handle.clone().snapshot().len(), 3);
    }
}
