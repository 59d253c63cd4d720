//! Deferred deletes awaiting their undo window.
//!
//! Each entry moves `Armed -> Fired | Cancelled` exactly once. Whoever removes
//! the entry from the map first (the expiring timer, an undo, or a flush) owns
//! its resolution; everyone else sees `None`.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

use tally_events::Operation;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::model::{Identifier, Item};

const ITEM_NAMESPACE: &str = "item:";
const BATCH_NAMESPACE: &str = "batch:";

/// Key of a pending delete. Single-item and batch deletes live in separate
/// namespaces so they never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PendingKey {
    /// Delete of one item, keyed by the item's key.
    Item(String),
    /// Delete of several items at once.
    Batch(Uuid),
}

impl PendingKey {
    /// Key for deleting a single item.
    #[must_use]
    pub fn item(id: &Identifier) -> Self {
        Self::Item(id.key())
    }

    /// Fresh batch key.
    #[must_use]
    pub fn batch() -> Self {
        Self::Batch(Uuid::new_v4())
    }

    /// Parse the textual form produced by `Display`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(key) = raw.strip_prefix(ITEM_NAMESPACE) {
            return (!key.is_empty()).then(|| Self::Item(key.to_string()));
        }
        raw.strip_prefix(BATCH_NAMESPACE)
            .and_then(|token| Uuid::parse_str(token).ok())
            .map(Self::Batch)
    }
}

impl Display for PendingKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(key) => write!(formatter, "{ITEM_NAMESPACE}{key}"),
            Self::Batch(token) => write!(formatter, "{BATCH_NAMESPACE}{token}"),
        }
    }
}

/// Items removed from the cache and held until the delete fires or is undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    /// Entry key.
    pub key: PendingKey,
    /// Operation that armed the entry.
    pub operation: Operation,
    /// Removed items.
    pub items: Vec<Item>,
    /// Index each item occupied before removal, parallel to `items`.
    pub indices: Vec<usize>,
}

impl PendingDelete {
    /// Whether the entry holds an item with this identifier.
    #[must_use]
    pub fn holds(&self, id: &Identifier) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }
}

#[derive(Debug)]
struct Armed {
    delete: PendingDelete,
    timer: AbortHandle,
}

/// Map of armed deletes keyed by [`PendingKey`].
#[derive(Debug, Clone, Default)]
pub struct PendingTracker {
    entries: Arc<Mutex<HashMap<PendingKey, Armed>>>,
}

impl PendingTracker {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `delete`, starting its timer while the map is locked so the timer
    /// can never observe a missing entry.
    ///
    /// Returns the delete back if its key is already armed.
    ///
    /// # Errors
    ///
    /// Returns the rejected entry when another entry already holds its key.
    pub fn arm(
        &self,
        delete: PendingDelete,
        start_timer: impl FnOnce(&PendingKey) -> AbortHandle,
    ) -> Result<(), PendingDelete> {
        let mut entries = self.lock();
        if entries.contains_key(&delete.key) {
            return Err(delete);
        }
        let timer = start_timer(&delete.key);
        entries.insert(delete.key.clone(), Armed { delete, timer });
        Ok(())
    }

    /// Cancel an entry and abort its timer. Idempotent.
    pub fn cancel(&self, key: &PendingKey) -> Option<PendingDelete> {
        self.claim(key)
    }

    /// Claim an entry ahead of its timer, aborting the timer.
    pub fn claim(&self, key: &PendingKey) -> Option<PendingDelete> {
        let armed = self.lock().remove(key)?;
        armed.timer.abort();
        Some(armed.delete)
    }

    /// Claim an entry for firing. Called by the entry's own timer, so the
    /// timer is left running.
    pub fn take(&self, key: &PendingKey) -> Option<PendingDelete> {
        self.lock().remove(key).map(|armed| armed.delete)
    }

    /// Claim every entry for immediate firing, aborting their timers.
    pub fn drain(&self) -> Vec<PendingDelete> {
        let mut drained: Vec<PendingDelete> = self
            .lock()
            .drain()
            .map(|(_, armed)| {
                armed.timer.abort();
                armed.delete
            })
            .collect();
        drained.sort_by(|left, right| left.key.cmp(&right.key));
        drained
    }

    /// Replace the held copy of item `id` with `replacement`. Used both to
    /// swap a placeholder for its confirmed server item and to roll a held
    /// item back after its update failed.
    pub fn replace_held(&self, id: &Identifier, replacement: &Item) -> bool {
        let mut entries = self.lock();
        for armed in entries.values_mut() {
            if let Some(item) = armed.delete.items.iter_mut().find(|item| &item.id == id) {
                *item = replacement.clone();
                return true;
            }
        }
        false
    }

    /// Drop item `id` from whichever entry holds it. An entry left empty is
    /// removed and its timer aborted; its key is returned.
    pub fn withdraw(&self, id: &Identifier) -> Option<PendingKey> {
        let mut entries = self.lock();
        let key = entries
            .iter()
            .find(|(_, armed)| armed.delete.holds(id))
            .map(|(key, _)| key.clone())?;
        let armed = entries.get_mut(&key)?;
        let delete = &mut armed.delete;
        if let Some(position) = delete.items.iter().position(|item| &item.id == id) {
            delete.items.remove(position);
            if position < delete.indices.len() {
                delete.indices.remove(position);
            }
        }
        if !delete.items.is_empty() {
            return None;
        }
        let emptied = entries.remove(&key)?;
        emptied.timer.abort();
        Some(key)
    }

    /// Keys of every armed entry, sorted.
    #[must_use]
    pub fn armed_keys(&self) -> Vec<PendingKey> {
        let mut keys: Vec<PendingKey> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Item keys held by any armed entry.
    #[must_use]
    pub fn held_item_keys(&self) -> HashSet<String> {
        self.lock()
            .values()
            .flat_map(|armed| armed.delete.items.iter().map(Item::key))
            .collect()
    }

    /// Whether `key` is armed.
    #[must_use]
    pub fn is_armed(&self, key: &PendingKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of armed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is armed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PendingKey, Armed>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_timer() -> AbortHandle {
        tokio::spawn(std::future::pending::<()>()).abort_handle()
    }

    fn entry(key: PendingKey, items: Vec<Item>) -> PendingDelete {
        let indices = (0..items.len()).collect();
        PendingDelete {
            key,
            operation: Operation::Delete,
            items,
            indices,
        }
    }

    #[test]
    fn keys_round_trip_through_text() {
        let item = PendingKey::item(&Identifier::from(7));
        assert_eq!(item.to_string(), "item:7");
        assert_eq!(PendingKey::parse("item:7"), Some(item));

        let batch = PendingKey::batch();
        assert!(batch.to_string().starts_with("batch:"));
        assert_eq!(PendingKey::parse(&batch.to_string()), Some(batch));

        assert_eq!(PendingKey::parse("item:"), None);
        assert_eq!(PendingKey::parse("batch:nope"), None);
        assert_eq!(PendingKey::parse("7"), None);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_aborts_timer() {
        let tracker = PendingTracker::new();
        let key = PendingKey::item(&Identifier::from(1));
        let handle = tokio::spawn(std::future::pending::<()>());
        let abort = handle.abort_handle();
        assert!(
            tracker
                .arm(entry(key.clone(), vec![Item::new(1, "Buy milk", false)]), |_| abort)
                .is_ok()
        );

        assert!(tracker.cancel(&key).is_some());
        assert!(tracker.cancel(&key).is_none());
        assert!(tracker.take(&key).is_none());
        assert!(handle.await.is_err_and(|err| err.is_cancelled()));
    }

    #[tokio::test]
    async fn duplicate_keys_are_rejected() {
        let tracker = PendingTracker::new();
        let key = PendingKey::item(&Identifier::from(1));
        assert!(tracker.arm(entry(key.clone(), Vec::new()), |_| idle_timer()).is_ok());
        let rejected = tracker.arm(entry(key.clone(), Vec::new()), |_| idle_timer());
        assert!(rejected.is_err());
        assert_eq!(tracker.len(), 1);
        let _ = tracker.drain();
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn replace_held_rewrites_held_placeholder() {
        let tracker = PendingTracker::new();
        let placeholder = Item::placeholder("Walk dog");
        let key = PendingKey::item(&placeholder.id);
        assert!(
            tracker
                .arm(entry(key.clone(), vec![placeholder.clone()]), |_| idle_timer())
                .is_ok()
        );

        let confirmed = Item::new(9, "Walk dog", false);
        assert!(tracker.replace_held(&placeholder.id, &confirmed));
        assert!(!tracker.replace_held(&placeholder.id, &confirmed));
        assert!(tracker.held_item_keys().contains("9"));

        let taken = tracker.take(&key);
        assert!(taken.is_some_and(|delete| delete.holds(&Identifier::from(9))));
    }

    #[tokio::test]
    async fn withdraw_shrinks_batches_and_removes_emptied_entries() {
        let tracker = PendingTracker::new();
        let placeholder = Item::placeholder("Walk dog");
        let batch = PendingKey::batch();
        assert!(
            tracker
                .arm(
                    entry(batch.clone(), vec![Item::new(1, "Buy milk", false), placeholder.clone()]),
                    |_| idle_timer(),
                )
                .is_ok()
        );
        let handle = tokio::spawn(std::future::pending::<()>());
        let abort = handle.abort_handle();
        let single = PendingKey::item(&Identifier::from(2));
        assert!(
            tracker
                .arm(entry(single.clone(), vec![Item::new(2, "Clean", true)]), |_| abort)
                .is_ok()
        );

        assert_eq!(tracker.withdraw(&placeholder.id), None);
        let shrunk = tracker.claim(&batch);
        assert!(shrunk.is_some_and(|delete| delete.items.len() == 1 && delete.indices == vec![0]));

        assert_eq!(tracker.withdraw(&Identifier::from(2)), Some(single.clone()));
        assert!(!tracker.is_armed(&single));
        assert!(handle.await.is_err_and(|err| err.is_cancelled()));
        assert_eq!(tracker.withdraw(&Identifier::from(2)), None);
    }

    #[tokio::test]
    async fn claim_aborts_the_timer() {
        let tracker = PendingTracker::new();
        let key = PendingKey::item(&Identifier::from(1));
        let handle = tokio::spawn(std::future::pending::<()>());
        let abort = handle.abort_handle();
        assert!(
            tracker
                .arm(entry(key.clone(), vec![Item::new(1, "Buy milk", false)]), |_| abort)
                .is_ok()
        );

        assert!(tracker.claim(&key).is_some());
        assert!(tracker.take(&key).is_none());
        assert!(handle.await.is_err_and(|err| err.is_cancelled()));
    }
}
