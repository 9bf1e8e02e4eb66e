//! Shared handle to the index store.

use std::sync::Arc;

use parking_lot::RwLock;

use super::IndexStore;
use crate::model::Entry;
use crate::telemetry::metrics::INDEXED_ENTRIES;

/// Index store shared between the service, the reconciler and searches.
///
/// Every mutation runs inside one `write` closure, so concurrent writers
/// are serialized. Clone is cheap - it just clones the Arc.
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    store: Arc<RwLock<IndexStore>>,
}

impl SharedIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a function with shared read access.
    pub fn read<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&IndexStore) -> T,
    {
        let store = self.store.read();
        f(&store)
    }

    /// Execute a function with exclusive write access.
    pub fn write<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut IndexStore) -> T,
    {
        let mut store = self.store.write();
        let result = f(&mut store);
        INDEXED_ENTRIES.set(i64::try_from(store.len()).unwrap_or(i64::MAX));
        result
    }

    /// Copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Entry> {
        self.read(|store| store.get().to_vec())
    }

    /// Location the shared index belongs to.
    #[must_use]
    pub fn location_id(&self) -> Option<String> {
        self.read(|store| store.location_id().map(str::to_string))
    }
}
