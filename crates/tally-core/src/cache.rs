//! Local cache: the single in-memory owner of the item collection.
//!
//! # Design
//! - Every operation is synchronous and total; a missing target is a no-op.
//! - [`Cache`] is a cloneable handle around a mutex that is only held for one
//!   operation at a time, never across an `.await`.
//! - Each mutation bumps the revision so observers can tell the collection changed.

use std::sync::{Arc, Mutex, PoisonError};

use crate::model::{Identifier, Item};

/// Point-in-time copy of the collection taken right before a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    items: Vec<Item>,
    revision: u64,
}

impl Snapshot {
    /// Items as they were when the snapshot was taken.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Cache revision at snapshot time.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// The snapshot's version of one item.
    #[must_use]
    pub fn item(&self, id: &Identifier) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }
}

/// Collection state guarded by [`Cache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCache {
    items: Vec<Item>,
    stale: bool,
    revision: u64,
}

impl LocalCache {
    /// Cache seeded with `items`.
    #[must_use]
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            items,
            stale: false,
            revision: 0,
        }
    }

    /// Current collection in display order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Replace the whole collection and clear the stale flag.
    pub fn replace(&mut self, items: Vec<Item>) {
        self.items = items;
        self.stale = false;
        self.touch();
    }

    /// Apply `updater` to the item matching `id`. Returns whether it was found.
    pub fn patch(&mut self, id: &Identifier, updater: impl FnOnce(&mut Item)) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| &item.id == id) else {
            return false;
        };
        updater(item);
        self.touch();
        true
    }

    /// Strip every item whose identifier is in `ids`; returns the removed items.
    pub fn remove(&mut self, ids: &[Identifier]) -> Vec<Item> {
        let (removed, kept): (Vec<Item>, Vec<Item>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| ids.contains(&item.id));
        self.items = kept;
        if !removed.is_empty() {
            self.touch();
        }
        removed
    }

    /// Re-insert items at their recorded indices.
    ///
    /// Pairs are applied in ascending index order so earlier insertions do not
    /// shift later ones; indices past the end are clamped and identifiers that
    /// are already present are skipped. Returns how many items were inserted.
    pub fn insert_at(&mut self, items: &[Item], indices: &[usize]) -> usize {
        let mut pairs: Vec<(usize, &Item)> = indices.iter().copied().zip(items).collect();
        pairs.sort_by_key(|(index, _)| *index);

        let mut inserted = 0;
        for (index, item) in pairs {
            if self.contains(&item.id) {
                continue;
            }
            let at = index.min(self.items.len());
            self.items.insert(at, item.clone());
            inserted += 1;
        }
        if inserted > 0 {
            self.touch();
        }
        inserted
    }

    /// Insert `item` at the top unless its identifier is already present.
    pub fn prepend_if_absent(&mut self, item: Item) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.insert(0, item);
        self.touch();
        true
    }

    /// Look up an item.
    #[must_use]
    pub fn get(&self, id: &Identifier) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Index of an item in display order.
    #[must_use]
    pub fn position(&self, id: &Identifier) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    /// Whether an item with this identifier is present.
    #[must_use]
    pub fn contains(&self, id: &Identifier) -> bool {
        self.position(id).is_some()
    }

    /// Copy of the collection for later rollback.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            items: self.items.clone(),
            revision: self.revision,
        }
    }

    /// Put the whole collection back to `snapshot`.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.items.clone_from(&snapshot.items);
        self.touch();
    }

    /// Put a single item back to its snapshot value, leaving every other item
    /// as it is now. Returns whether anything was restored.
    pub fn restore_item(&mut self, snapshot: &Snapshot, id: &Identifier) -> bool {
        let Some(previous) = snapshot.item(id).cloned() else {
            return false;
        };
        self.patch(id, |item| *item = previous)
    }

    /// Flag the collection as possibly diverging from the remote.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Whether a refresh is due.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    /// Monotonic mutation counter.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

/// Shared handle to the local cache.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    inner: Arc<Mutex<LocalCache>>,
}

impl Cache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache seeded with `items`.
    #[must_use]
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LocalCache::with_items(items))),
        }
    }

    /// Run one atomic step against the cache.
    pub fn with<T>(&self, step: impl FnOnce(&mut LocalCache) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        step(&mut guard)
    }

    /// Copy of the current collection.
    #[must_use]
    pub fn read(&self) -> Vec<Item> {
        self.with(|cache| cache.items().to_vec())
    }

    /// See [`LocalCache::replace`].
    pub fn replace(&self, items: Vec<Item>) {
        self.with(|cache| cache.replace(items));
    }

    /// See [`LocalCache::patch`].
    pub fn patch(&self, id: &Identifier, updater: impl FnOnce(&mut Item)) -> bool {
        self.with(|cache| cache.patch(id, updater))
    }

    /// See [`LocalCache::remove`].
    pub fn remove(&self, ids: &[Identifier]) -> Vec<Item> {
        self.with(|cache| cache.remove(ids))
    }

    /// See [`LocalCache::insert_at`].
    pub fn insert_at(&self, items: &[Item], indices: &[usize]) -> usize {
        self.with(|cache| cache.insert_at(items, indices))
    }

    /// See [`LocalCache::get`].
    #[must_use]
    pub fn get(&self, id: &Identifier) -> Option<Item> {
        self.with(|cache| cache.get(id).cloned())
    }

    /// See [`LocalCache::snapshot`].
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.with(|cache| cache.snapshot())
    }

    /// See [`LocalCache::restore`].
    pub fn restore(&self, snapshot: &Snapshot) {
        self.with(|cache| cache.restore(snapshot));
    }

    /// See [`LocalCache::mark_stale`].
    pub fn mark_stale(&self) {
        self.with(LocalCache::mark_stale);
    }

    /// See [`LocalCache::is_stale`].
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.with(|cache| cache.is_stale())
    }

    /// See [`LocalCache::revision`].
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.with(|cache| cache.revision())
    }

    /// Number of items held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with(|cache| cache.items().len())
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<Item> {
        vec![
            Item::new(1, "Buy milk", false),
            Item::new(2, "Clean", true),
            Item::new(3, "Read", false),
        ]
    }

    fn ids(cache: &Cache) -> Vec<String> {
        cache.read().iter().map(Item::key).collect()
    }

    #[test]
    fn patch_touches_only_the_target() {
        let cache = Cache::with_items(items());
        assert!(cache.patch(&Identifier::from(2), |item| item.completed = false));
        let read = cache.read();
        assert!(!read[1].completed);
        assert_eq!(read[0], items()[0]);
        assert_eq!(read[2], items()[2]);
    }

    #[test]
    fn missing_targets_are_silent_noops() {
        let cache = Cache::with_items(items());
        let before = cache.revision();
        assert!(!cache.patch(&Identifier::from(9), |item| item.title.clear()));
        assert!(cache.remove(&[Identifier::from(9)]).is_empty());
        assert_eq!(cache.revision(), before);
        assert_eq!(cache.read(), items());
    }

    #[test]
    fn remove_then_insert_at_restores_order() {
        let cache = Cache::with_items(items());
        let removed = cache.remove(&[Identifier::from(1), Identifier::from(3)]);
        assert_eq!(ids(&cache), vec!["2"]);

        // Out-of-order indices still land where they were.
        let reversed: Vec<Item> = removed.iter().rev().cloned().collect();
        assert_eq!(cache.insert_at(&reversed, &[2, 0]), 2);
        assert_eq!(cache.read(), items());
    }

    #[test]
    fn insert_at_is_idempotent_and_clamps() {
        let cache = Cache::with_items(items());
        assert_eq!(cache.insert_at(&[Item::new(2, "Clean", true)], &[0]), 0);
        assert_eq!(cache.insert_at(&[Item::new(4, "Walk", false)], &[99]), 1);
        assert_eq!(ids(&cache), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn prepend_if_absent_guards_duplicates() {
        let cache = Cache::with_items(items());
        assert!(!cache.with(|c| c.prepend_if_absent(Item::new(3, "Read", false))));
        assert!(cache.with(|c| c.prepend_if_absent(Item::new(4, "Walk", false))));
        assert_eq!(ids(&cache), vec!["4", "1", "2", "3"]);
    }

    #[test]
    fn restore_item_leaves_other_changes_alone() {
        let cache = Cache::with_items(items());
        let snapshot = cache.snapshot();
        cache.patch(&Identifier::from(1), |item| item.completed = true);
        cache.patch(&Identifier::from(3), |item| item.title = "Read twice".into());

        assert!(cache.with(|c| c.restore_item(&snapshot, &Identifier::from(1))));
        let read = cache.read();
        assert!(!read[0].completed);
        assert_eq!(read[2].title, "Read twice");

        cache.restore(&snapshot);
        assert_eq!(cache.read(), items());
    }

    #[test]
    fn replace_clears_stale_flag() {
        let cache = Cache::with_items(items());
        cache.mark_stale();
        assert!(cache.is_stale());
        cache.replace(Vec::new());
        assert!(!cache.is_stale());
        assert!(cache.is_empty());
    }
}
