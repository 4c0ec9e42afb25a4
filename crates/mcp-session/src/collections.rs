//! Keyed collections of primitives with change notifications (§4.8).
//!
//! Insertion order is preserved for enumeration (`tools/list` et al. must
//! return a stable order a paginated cursor can walk); mutation is
//! reader-writer so concurrent list calls never block each other, and a
//! change notification fires only after the write lock is released (§5
//! Shared resources).

use std::sync::Arc;

use parking_lot::RwLock;

/// A name-or-uri-keyed primitive collection with ordered enumeration and a
/// change-notification hook.
pub struct PrimitiveCollection<T> {
    /// Insertion-ordered entries, each keyed by its primitive name.
    entries: RwLock<Vec<(String, T)>>,
    on_change: RwLock<Vec<Arc<dyn Fn() + Send + Sync>>>,
}

impl<T> Default for PrimitiveCollection<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            on_change: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Clone> PrimitiveCollection<T> {
    /// Build an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback fired after every insertion or removal. Typically
    /// wired to emit a `list_changed` notification (§4.8).
    pub fn on_change(&self, callback: Arc<dyn Fn() + Send + Sync>) {
        self.on_change.write().push(callback);
    }

    /// Insert or replace the entry named `name`, preserving its original
    /// position on replacement and appending on first insertion.
    pub fn insert(&self, name: impl Into<String>, value: T) {
        let name = name.into();
        {
            let mut entries = self.entries.write();
            if let Some(slot) = entries.iter_mut().find(|(existing, _)| *existing == name) {
                slot.1 = value;
            } else {
                entries.push((name, value));
            }
        }
        self.notify();
    }

    /// Remove the entry named `name`, returning it if present.
    pub fn remove(&self, name: &str) -> Option<T> {
        let removed = {
            let mut entries = self.entries.write();
            entries
                .iter()
                .position(|(existing, _)| existing == name)
                .map(|index| entries.remove(index).1)
        };
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Look up a single entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<T> {
        self.entries
            .read()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.clone())
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<T> {
        self.entries.read().iter().map(|(_, value)| value.clone()).collect()
    }

    /// All entries in insertion order, paired with their keys.
    #[must_use]
    pub fn list_with_names(&self) -> Vec<(String, T)> {
        self.entries.read().clone()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// `true` if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self) {
        for callback in self.on_change.read().iter() {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn insertion_order_is_preserved() {
        let collection = PrimitiveCollection::new();
        collection.insert("c", 3);
        collection.insert("a", 1);
        collection.insert("b", 2);
        assert_eq!(collection.list(), vec![3, 1, 2]);
    }

    #[test]
    fn replacing_an_entry_keeps_its_position() {
        let collection = PrimitiveCollection::new();
        collection.insert("a", 1);
        collection.insert("b", 2);
        collection.insert("a", 99);
        assert_eq!(collection.list(), vec![99, 2]);
    }

    #[test]
    fn change_notification_fires_after_write_releases() {
        let collection: PrimitiveCollection<i32> = PrimitiveCollection::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        collection.on_change(Arc::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        collection.insert("a", 1);
        collection.remove("a");
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_on_missing_key_does_not_notify() {
        let collection: PrimitiveCollection<i32> = PrimitiveCollection::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        collection.on_change(Arc::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(collection.remove("missing").is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
