//! Concurrent ID-keyed registries.
//!
//! A [`Registry`] is the one shared-state primitive in Roomcast: every
//! room keeps one for its clients, and the server keeps one for rooms.
//! Locks are held only long enough to touch the map. Callers never get a
//! live view; [`Registry::list`] returns a copied snapshot, so it is safe
//! to await network I/O while walking it.

use std::collections::HashMap;
use std::sync::Arc;

use roomcast_protocol::Id;
use tokio::sync::RwLock;

/// Something a [`Registry`] can index.
pub trait Keyed {
    /// The ID this entry is stored under.
    fn key(&self) -> &Id;
}

/// A map from [`Id`] to shared entries behind a reader/writer lock.
pub struct Registry<T> {
    entries: RwLock<HashMap<Id, Arc<T>>>,
}

impl<T: Keyed> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts `entry` under its key. A previous entry with the same key
    /// is replaced and returned.
    pub async fn add(&self, entry: Arc<T>) -> Option<Arc<T>> {
        let key = entry.key().clone();
        self.entries.write().await.insert(key, entry)
    }

    pub async fn find(&self, id: &Id) -> Option<Arc<T>> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn has(&self, id: &Id) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Removes and returns the entry; an absent ID is a no-op.
    pub async fn remove(&self, id: &Id) -> Option<Arc<T>> {
        self.entries.write().await.remove(id)
    }

    /// A point-in-time copy of every entry, in no particular order.
    pub async fn list(&self) -> Vec<Arc<T>> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T: Keyed> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
