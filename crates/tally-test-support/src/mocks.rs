//! In-memory remote collection with failure injection and call recording.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tally_core::{Identifier, Item, ItemPatch, RemoteCollection, RemoteError, RemoteResult};
use tokio::sync::Notify;

/// A request the fake received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `list()`.
    List,
    /// `create(title)`.
    Create(String),
    /// `update(id, patch)`.
    Update(Identifier, ItemPatch),
    /// `delete(id)`.
    Delete(Identifier),
}

#[derive(Debug, Default)]
struct State {
    items: Vec<Item>,
    next_id: u64,
    calls: Vec<Call>,
    fail_list: bool,
    fail_create: bool,
    fail_all_updates: bool,
    failing_updates: HashSet<Identifier>,
    failing_deletes: HashSet<Identifier>,
}

/// Cloneable fake; clones share state so tests can inspect what a controller
/// did with its copy.
#[derive(Debug, Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<State>>,
    create_gate: Arc<Mutex<Option<Arc<Notify>>>>,
    update_gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl FakeRemote {
    /// Fake holding `items`; new ids continue after the largest numeric id.
    #[must_use]
    pub fn with_items(items: Vec<Item>) -> Self {
        let next_id = items
            .iter()
            .filter_map(|item| item.key().parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let remote = Self::default();
        {
            let mut state = remote.state();
            state.items = items;
            state.next_id = next_id;
        }
        remote
    }

    /// Server-side collection.
    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        self.state().items.clone()
    }

    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Identifiers passed to `delete`, in order.
    #[must_use]
    pub fn deleted_ids(&self) -> Vec<Identifier> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Delete(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `update` calls received.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Update(..)))
            .count()
    }

    /// Add an item directly on the server side.
    pub fn insert(&self, item: Item) {
        self.state().items.push(item);
    }

    /// Make `list` fail.
    pub fn fail_list(&self, fail: bool) {
        self.state().fail_list = fail;
    }

    /// Make `create` fail.
    pub fn fail_create(&self, fail: bool) {
        self.state().fail_create = fail;
    }

    /// Make every `update` fail.
    pub fn fail_all_updates(&self, fail: bool) {
        self.state().fail_all_updates = fail;
    }

    /// Make `update` fail for one item.
    pub fn fail_update_for(&self, id: impl Into<Identifier>) {
        self.state().failing_updates.insert(id.into());
    }

    /// Make `delete` fail for one item.
    pub fn fail_delete_for(&self, id: impl Into<Identifier>) {
        self.state().failing_deletes.insert(id.into());
    }

    /// Hold every `create` until the returned gate is notified once per call.
    /// The server-side item exists as soon as the call arrives; an injected
    /// failure is reported only once the gate opens.
    #[must_use]
    pub fn hold_creates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.create_gate) = Some(Arc::clone(&gate));
        gate
    }

    /// Hold every `update` until the returned gate is notified once per call.
    #[must_use]
    pub fn hold_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.update_gate) = Some(Arc::clone(&gate));
        gate
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn rejected(operation: &'static str, status: u16) -> RemoteError {
    RemoteError::Rejected {
        operation,
        status,
        detail: format!("injected {operation} failure"),
    }
}

async fn pass(gate: &Mutex<Option<Arc<Notify>>>) {
    let gate = lock(gate).clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

#[async_trait]
impl RemoteCollection for FakeRemote {
    async fn list(&self) -> RemoteResult<Vec<Item>> {
        let mut state = self.state();
        state.calls.push(Call::List);
        if state.fail_list {
            return Err(rejected("list", 503));
        }
        Ok(state.items.clone())
    }

    async fn create(&self, title: &str) -> RemoteResult<Item> {
        let created = {
            let mut state = self.state();
            state.calls.push(Call::Create(title.to_string()));
            if state.fail_create {
                None
            } else {
                let item = Item::new(state.next_id, title, false);
                state.next_id += 1;
                state.items.push(item.clone());
                Some(item)
            }
        };
        pass(&self.create_gate).await;
        created.ok_or_else(|| rejected("create", 500))
    }

    async fn update(&self, item: &Item, patch: &ItemPatch) -> RemoteResult<Item> {
        self.state()
            .calls
            .push(Call::Update(item.id.clone(), patch.clone()));
        pass(&self.update_gate).await;

        let mut state = self.state();
        if state.fail_all_updates || state.failing_updates.contains(&item.id) {
            return Err(rejected("update", 500));
        }
        let stored = state
            .items
            .iter_mut()
            .find(|stored| stored.id == item.id)
            .ok_or_else(|| rejected("update", 404))?;
        *stored = stored.with_patch(patch);
        Ok(stored.clone())
    }

    async fn delete(&self, id: &Identifier) -> RemoteResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Delete(id.clone()));
        if state.failing_deletes.contains(id) {
            return Err(rejected("delete", 500));
        }
        let before = state.items.len();
        state.items.retain(|item| &item.id != id);
        if state.items.len() == before {
            return Err(rejected("delete", 404));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_applies_and_records_calls() {
        let remote = FakeRemote::with_items(vec![Item::new(1, "Buy milk", false)]);
        let created = remote.create("Walk dog").await;
        assert_eq!(created.ok().map(|item| item.key()), Some("2".to_string()));

        let updated = remote
            .update(&Item::new(1, "Buy milk", true), &ItemPatch::completed(true))
            .await;
        assert!(updated.is_ok_and(|item| item.completed));

        assert!(remote.delete(&Identifier::from(1)).await.is_ok());
        assert!(remote.delete(&Identifier::from(1)).await.is_err());
        assert_eq!(remote.deleted_ids().len(), 2);
        assert_eq!(remote.items().len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_reject() {
        let remote = FakeRemote::with_items(vec![Item::new(1, "Buy milk", false)]);
        remote.fail_update_for(1);
        remote.fail_list(true);
        assert!(remote.list().await.is_err());
        let result = remote
            .update(&Item::new(1, "Buy milk", true), &ItemPatch::completed(true))
            .await;
        assert!(matches!(
            result,
            Err(RemoteError::Rejected { status: 500, .. })
        ));
    }
}
