use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::model::DataView;

type Writers = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Exclusive write access to one view identifier.
///
/// Holding this serializes editors of that identifier only; readers and
/// writers of other views are unaffected. Dropping the last guard or waiter
/// for an identifier forgets its mutex.
pub struct ViewWriteGuard {
    id: String,
    writers: Writers,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ViewWriteGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ViewWriteGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Lockers clone under the shard lock, so a count of one means no waiter
        self.writers
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Concurrent store of view snapshots.
///
/// Reads clone an `Arc` and never wait on writers. Writes replace the whole
/// snapshot and require the view's write guard.
pub struct ViewStore {
    views: DashMap<String, Arc<DataView>>,
    writers: Writers,
}

impl ViewStore {
    pub fn new() -> Self {
        Self {
            views: DashMap::new(),
            writers: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive write access to `id`
    pub async fn lock(&self, id: &str) -> ViewWriteGuard {
        let mutex = self
            .writers
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        ViewWriteGuard {
            id: id.to_string(),
            writers: Arc::clone(&self.writers),
            guard: Some(mutex.lock_owned().await),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<DataView>> {
        self.views.get(id).map(|v| Arc::clone(&v))
    }

    /// Store a snapshot under the guard's identifier
    pub fn put(&self, guard: &ViewWriteGuard, view: DataView) -> Arc<DataView> {
        debug_assert_eq!(guard.id(), view.id);
        let view = Arc::new(view);
        self.views.insert(guard.id().to_string(), Arc::clone(&view));
        view
    }

    /// Remove a view. Returns whether it existed.
    pub fn remove(&self, guard: &ViewWriteGuard) -> bool {
        self.views.remove(guard.id()).is_some()
    }

    /// Identifiers in ascending order
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.views.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Identifiers with a held or awaited write guard
    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}
