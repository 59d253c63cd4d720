//! Optimistic list controller.
//!
//! # Design
//! - Every mutation writes the cache first, then talks to the remote, then
//!   settles: the server's version replaces the optimistic one, or the
//!   mutation's own snapshot is restored for the items it touched.
//! - Locks are taken for one synchronous step at a time and always in the
//!   order cache, then selection, pending deletes or in-flight creates. No
//!   lock is held across an `.await`.
//! - Every settled mutation marks the collection stale and says so on the bus.
//! - Deletes are deferred: items leave the cache at once and the remote call
//!   waits out the undo window on a spawned timer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tally_events::{Event, EventBus, Operation, Outcome};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::error::{CoreError, CoreResult};
use crate::messages;
use crate::model::{Identifier, Item, ItemPatch};
use crate::pending::{PendingDelete, PendingKey, PendingTracker};
use crate::remote::RemoteCollection;
use crate::selection::{DEFAULT_SELECT_ALL_LIMIT, SelectionSet};
use crate::validate::{DEFAULT_MIN_TITLE_LEN, validate_title};

/// Default undo window for deferred deletes.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(5);

/// Tunables for [`ListController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// How long a delete stays undoable before it is sent.
    pub undo_window: Duration,
    /// Largest select-all accepted.
    pub select_all_limit: usize,
    /// Minimum trimmed title length.
    pub min_title_len: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            undo_window: DEFAULT_UNDO_WINDOW,
            select_all_limit: DEFAULT_SELECT_ALL_LIMIT,
            min_title_len: DEFAULT_MIN_TITLE_LEN,
        }
    }
}

/// Result of a fired delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    /// Entry that fired.
    pub key: PendingKey,
    /// Remote deletes issued.
    pub attempted: usize,
    /// Remote deletes that failed; those items are not restored.
    pub failed: usize,
    /// Unconfirmed items dropped without a remote call.
    pub skipped: usize,
}

/// Result of a bulk completion change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkReport {
    /// Items the server accepted.
    pub updated: usize,
    /// Items rolled back after a failure.
    pub failed: usize,
}

struct Shared<R> {
    remote: R,
    cache: Cache,
    selection: Mutex<SelectionSet>,
    pending: PendingTracker,
    creating: Mutex<HashSet<Identifier>>,
    events: EventBus,
    settings: ControllerSettings,
}

/// Reconciles the remote collection with local optimistic and pending state.
pub struct ListController<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for ListController<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

enum Placement {
    Replaced,
    Duplicate,
    Held,
    Orphaned,
}

impl<R> ListController<R>
where
    R: RemoteCollection + 'static,
{
    /// Controller with an empty cache; call [`ListController::refresh`] to load.
    #[must_use]
    pub fn new(remote: R, events: EventBus, settings: ControllerSettings) -> Self {
        Self::with_items(remote, events, settings, Vec::new())
    }

    /// Controller whose cache starts with `items`.
    #[must_use]
    pub fn with_items(
        remote: R,
        events: EventBus,
        settings: ControllerSettings,
        items: Vec<Item>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                remote,
                cache: Cache::with_items(items),
                selection: Mutex::new(SelectionSet::new(settings.select_all_limit)),
                pending: PendingTracker::new(),
                creating: Mutex::new(HashSet::new()),
                events,
                settings,
            }),
        }
    }

    /// Notification bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Local cache.
    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.shared.cache
    }

    /// Current collection.
    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        self.shared.cache.read()
    }

    /// Active tunables.
    #[must_use]
    pub fn settings(&self) -> ControllerSettings {
        self.shared.settings
    }

    /// Replace the cache with the remote listing.
    ///
    /// Items held by armed deletes stay hidden. Placeholders stay on top only
    /// while their create is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Remote`] when the listing fails; the cache is left
    /// untouched.
    pub async fn refresh(&self) -> CoreResult<usize> {
        let listed = match self.shared.remote.list().await {
            Ok(listed) => listed,
            Err(err) => {
                warn!(operation = "refresh", error = %err, "refresh failed");
                self.notify(Operation::Refresh, Outcome::Failed, messages::refresh_failed());
                return Err(err.into());
            }
        };

        let held = self.shared.pending.held_item_keys();
        let count = self.shared.cache.with(|cache| {
            let mut seen: HashSet<Identifier> = HashSet::new();
            let creating = self.creating();
            let mut next: Vec<Item> = cache
                .items()
                .iter()
                .filter(|item| !item.id.is_persisted() && creating.contains(&item.id))
                .cloned()
                .collect();
            drop(creating);
            next.extend(
                listed
                    .into_iter()
                    .filter(|item| !held.contains(&item.key()))
                    .filter(|item| seen.insert(item.id.clone())),
            );
            cache.replace(next);
            self.selection().prune(cache.items());
            cache.items().len()
        });

        info!(operation = "refresh", count, "collection refreshed");
        self.shared
            .events
            .publish(Event::CollectionRefreshed { count });
        Ok(count)
    }

    /// Flip the completion flag of one item.
    ///
    /// # Errors
    ///
    /// Rejects unknown or unconfirmed items before any change; returns
    /// [`CoreError::Remote`] after rolling back when the server refuses.
    pub async fn toggle(&self, id: &Identifier) -> CoreResult<Item> {
        ensure_confirmed(id)?;
        let current = self.find(id)?;
        self.apply_update(
            Operation::Toggle,
            id,
            ItemPatch::completed(!current.completed),
        )
        .await
    }

    /// Set the title of one item.
    ///
    /// # Errors
    ///
    /// Rejects short titles and unknown or unconfirmed items before any
    /// change; returns [`CoreError::Remote`] after rolling back when the
    /// server refuses.
    pub async fn edit_title(&self, id: &Identifier, title: &str) -> CoreResult<Item> {
        let title = validate_title(title, self.shared.settings.min_title_len)?;
        ensure_confirmed(id)?;
        let _ = self.find(id)?;
        self.apply_update(Operation::Edit, id, ItemPatch::title(title))
            .await
    }

    async fn apply_update(
        &self,
        operation: Operation,
        id: &Identifier,
        patch: ItemPatch,
    ) -> CoreResult<Item> {
        let (snapshot, desired) = self
            .shared
            .cache
            .with(|cache| {
                let snapshot = cache.snapshot();
                let desired = cache.get(id)?.with_patch(&patch);
                cache.patch(id, |item| item.clone_from(&desired));
                Some((snapshot, desired))
            })
            .ok_or_else(|| CoreError::NotFound { id: id.clone() })?;
        debug!(operation = operation.as_str(), key = %id, "optimistic write applied");

        let result = match self.shared.remote.update(&desired, &patch).await {
            Ok(server) => {
                let settled = with_local_id(id, server);
                self.shared
                    .cache
                    .patch(id, |item| item.clone_from(&settled));
                self.shared.pending.replace_held(id, &settled);
                info!(operation = operation.as_str(), key = %id, "update confirmed");
                let message = match operation {
                    Operation::Edit => messages::renamed(&settled),
                    _ => messages::toggled(&settled),
                };
                self.notify(operation, Outcome::Succeeded, message);
                Ok(settled)
            }
            Err(err) => {
                self.shared
                    .cache
                    .with(|cache| cache.restore_item(&snapshot, id));
                if let Some(previous) = snapshot.item(id) {
                    self.shared.pending.replace_held(id, previous);
                }
                warn!(operation = operation.as_str(), key = %id, error = %err, "update failed; rolled back");
                let title = snapshot
                    .item(id)
                    .map_or_else(|| id.key(), |item| item.title.clone());
                self.notify(operation, Outcome::Reverted, messages::update_reverted(&title));
                Err(err.into())
            }
        };
        self.mark_stale(operation);
        result
    }

    /// Create an item, showing a placeholder until the server confirms it.
    ///
    /// # Errors
    ///
    /// Rejects short titles before any change; returns [`CoreError::Remote`]
    /// after withdrawing the placeholder when the server refuses.
    pub async fn create(&self, title: &str) -> CoreResult<Item> {
        let title = validate_title(title, self.shared.settings.min_title_len)?;
        let placeholder = Item::placeholder(title.clone());
        let pending_id = placeholder.id.clone();
        self.shared.cache.with(|cache| {
            self.creating().insert(pending_id.clone());
            cache.prepend_if_absent(placeholder)
        });
        debug!(operation = "create", key = %pending_id, "placeholder inserted");
        self.notify(Operation::Create, Outcome::InFlight, messages::creating(&title));

        let result = match self.shared.remote.create(&title).await {
            Ok(server) => {
                let placement = self.shared.cache.with(|cache| {
                    self.creating().remove(&pending_id);
                    if cache.contains(&pending_id) {
                        if cache.contains(&server.id) {
                            cache.remove(std::slice::from_ref(&pending_id));
                            Placement::Duplicate
                        } else {
                            cache.patch(&pending_id, |item| item.clone_from(&server));
                            Placement::Replaced
                        }
                    } else {
                        // The placeholder was deleted while in flight; a racing
                        // refresh may have listed the server item meanwhile.
                        cache.remove(std::slice::from_ref(&server.id));
                        if self.shared.pending.replace_held(&pending_id, &server) {
                            Placement::Held
                        } else {
                            Placement::Orphaned
                        }
                    }
                });
                match placement {
                    Placement::Replaced | Placement::Held => {}
                    Placement::Duplicate => {
                        debug!(operation = "create", key = %server.id, "already listed; placeholder dropped");
                    }
                    Placement::Orphaned => self.discard_orphan(&server).await,
                }
                self.prune_selection();
                info!(operation = "create", key = %server.id, "create confirmed");
                self.notify(Operation::Create, Outcome::Succeeded, messages::created(&server));
                Ok(server)
            }
            Err(err) => {
                self.shared.cache.with(|cache| {
                    self.creating().remove(&pending_id);
                    cache.remove(std::slice::from_ref(&pending_id));
                });
                if let Some(key) = self.shared.pending.withdraw(&pending_id) {
                    debug!(operation = "create", key = %key, "pending delete of the placeholder dropped");
                    self.shared.events.publish(Event::UndoExpired {
                        key: key.to_string(),
                    });
                }
                self.prune_selection();
                warn!(operation = "create", error = %err, "create failed; placeholder removed");
                self.notify(
                    Operation::Create,
                    Outcome::Reverted,
                    messages::create_reverted(&title),
                );
                Err(err.into())
            }
        };
        self.mark_stale(Operation::Create);
        result
    }

    /// The placeholder was deleted and its delete already fired while the
    /// create was in flight; honour the delete against the confirmed item.
    async fn discard_orphan(&self, server: &Item) {
        debug!(operation = "create", key = %server.id, "placeholder deleted in flight");
        if let Err(err) = self.shared.remote.delete(&server.id).await {
            warn!(operation = "delete", key = %server.id, error = %err, "orphan delete failed");
        }
    }

    /// Change the completion flag of several items at once.
    ///
    /// Unknown and unconfirmed identifiers are skipped. Failures are rolled
    /// back per item and reported in one aggregate notification.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when no identifier names an
    /// updatable item.
    pub async fn set_completed_many(
        &self,
        ids: &[Identifier],
        completed: bool,
    ) -> CoreResult<BulkReport> {
        let patch = ItemPatch::completed(completed);
        let (snapshot, targets) = self.shared.cache.with(|cache| {
            let snapshot = cache.snapshot();
            let mut targets: Vec<Item> = Vec::new();
            for id in ids.iter().filter(|id| id.is_persisted()) {
                if targets.iter().any(|target| &target.id == id) {
                    continue;
                }
                let Some(desired) = cache.get(id).map(|item| item.with_patch(&patch)) else {
                    continue;
                };
                cache.patch(id, |item| item.clone_from(&desired));
                targets.push(desired);
            }
            (snapshot, targets)
        });
        if targets.is_empty() {
            return Err(CoreError::Validation {
                field: "selection",
                reason: "no saved items to update".to_string(),
            });
        }
        debug!(operation = "bulk_update", count = targets.len(), completed, "optimistic write applied");

        let remote = &self.shared.remote;
        let results = join_all(targets.iter().map(|item| remote.update(item, &patch))).await;

        let mut failed = 0;
        self.shared.cache.with(|cache| {
            for (target, result) in targets.iter().zip(results) {
                match result {
                    Ok(server) => {
                        let settled = with_local_id(&target.id, server);
                        self.shared.pending.replace_held(&target.id, &settled);
                        cache.patch(&target.id, |item| *item = settled);
                    }
                    Err(err) => {
                        failed += 1;
                        cache.restore_item(&snapshot, &target.id);
                        if let Some(previous) = snapshot.item(&target.id) {
                            self.shared.pending.replace_held(&target.id, previous);
                        }
                        warn!(operation = "bulk_update", key = %target.id, error = %err, "update failed; rolled back");
                    }
                }
            }
        });

        let total = targets.len();
        let outcome = if failed == 0 {
            Outcome::Succeeded
        } else {
            Outcome::Reverted
        };
        info!(operation = "bulk_update", total, failed, "bulk update settled");
        self.notify(
            Operation::BulkUpdate,
            outcome,
            messages::bulk_updated(total, failed),
        );
        self.mark_stale(Operation::BulkUpdate);
        Ok(BulkReport {
            updated: total - failed,
            failed,
        })
    }

    /// Change the completion flag of every selected item.
    ///
    /// # Errors
    ///
    /// See [`ListController::set_completed_many`].
    pub async fn complete_selected(&self, completed: bool) -> CoreResult<BulkReport> {
        let ids = self.selected_ids();
        self.set_completed_many(&ids, completed).await
    }

    /// Remove one item and arm its deferred delete. Must run inside a tokio
    /// runtime, which drives the undo timer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when the item is not in the collection.
    pub fn delete(&self, id: &Identifier) -> CoreResult<PendingKey> {
        let (items, indices) = self
            .shared
            .cache
            .with(|cache| {
                let index = cache.position(id)?;
                let items = cache.remove(std::slice::from_ref(id));
                Some((items, vec![index]))
            })
            .ok_or_else(|| CoreError::NotFound { id: id.clone() })?;
        self.arm(PendingKey::item(id), Operation::Delete, items, indices)
    }

    /// Remove several items under one batch key and arm their deferred delete.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for an empty request and
    /// [`CoreError::NotFound`] when none of the items are present.
    pub fn delete_many(&self, ids: &[Identifier]) -> CoreResult<PendingKey> {
        let Some(first) = ids.first() else {
            return Err(CoreError::Validation {
                field: "selection",
                reason: "nothing to delete".to_string(),
            });
        };
        let (items, indices) = self.shared.cache.with(|cache| {
            let mut found: Vec<(usize, Item)> = ids
                .iter()
                .filter_map(|id| {
                    let index = cache.position(id)?;
                    cache.get(id).map(|item| (index, item.clone()))
                })
                .collect();
            found.sort_by_key(|(index, _)| *index);
            found.dedup_by_key(|(index, _)| *index);
            let targets: Vec<Identifier> = found.iter().map(|(_, item)| item.id.clone()).collect();
            cache.remove(&targets);
            let (indices, items): (Vec<usize>, Vec<Item>) = found.into_iter().unzip();
            (items, indices)
        });
        if items.is_empty() {
            return Err(CoreError::NotFound { id: first.clone() });
        }
        self.arm(PendingKey::batch(), Operation::BulkDelete, items, indices)
    }

    /// Delete every selected item as one batch and clear the selection.
    ///
    /// # Errors
    ///
    /// See [`ListController::delete_many`].
    pub fn delete_selected(&self) -> CoreResult<PendingKey> {
        let ids = self.selected_ids();
        let key = self.delete_many(&ids)?;
        self.clear_selection();
        Ok(key)
    }

    fn arm(
        &self,
        key: PendingKey,
        operation: Operation,
        items: Vec<Item>,
        indices: Vec<usize>,
    ) -> CoreResult<PendingKey> {
        let count = items.len();
        let window = self.shared.settings.undo_window;
        let delete = PendingDelete {
            key: key.clone(),
            operation,
            items,
            indices,
        };

        let controller = self.clone();
        let armed = self.shared.pending.arm(delete, |key| {
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                if let Some(delete) = controller.shared.pending.take(&key) {
                    let _ = controller.settle_delete(delete).await;
                }
            })
            .abort_handle()
        });
        if let Err(rejected) = armed {
            self.shared
                .cache
                .insert_at(&rejected.items, &rejected.indices);
            return Err(CoreError::Validation {
                field: "id",
                reason: format!("{} is already pending deletion", rejected.key),
            });
        }

        self.prune_selection();
        info!(operation = operation.as_str(), key = %key, count, "delete armed");
        self.shared.events.publish(Event::UndoOffered {
            key: key.to_string(),
            count,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
        });
        Ok(key)
    }

    /// Cancel an armed delete and put its items back where they were.
    ///
    /// Returns the number of items reinserted, or `None` when the key is not
    /// armed (already undone, already fired, or never existed).
    pub fn undo(&self, key: &PendingKey) -> Option<usize> {
        let delete = self.shared.pending.cancel(key)?;
        let inserted = self
            .shared
            .cache
            .insert_at(&delete.items, &delete.indices);
        info!(operation = "undo", key = %key, inserted, "delete cancelled");
        self.notify(
            Operation::Undo,
            Outcome::Succeeded,
            messages::restored(delete.items.len()),
        );
        self.mark_stale(Operation::Undo);
        Some(inserted)
    }

    /// Fire an armed delete now, stopping its timer. Returns `None` when it
    /// is no longer armed.
    pub async fn fire(&self, key: &PendingKey) -> Option<DeleteReport> {
        let delete = self.shared.pending.claim(key)?;
        Some(self.settle_delete(delete).await)
    }

    /// Fire every armed delete immediately, in key order.
    pub async fn flush(&self) -> Vec<DeleteReport> {
        let mut reports = Vec::new();
        for delete in self.shared.pending.drain() {
            reports.push(self.settle_delete(delete).await);
        }
        reports
    }

    /// Keys of deletes still inside their undo window.
    #[must_use]
    pub fn armed_keys(&self) -> Vec<PendingKey> {
        self.shared.pending.armed_keys()
    }

    async fn settle_delete(&self, delete: PendingDelete) -> DeleteReport {
        let PendingDelete {
            key,
            operation,
            items,
            ..
        } = delete;
        let targets: Vec<&Item> = items.iter().filter(|item| item.id.is_persisted()).collect();
        let skipped = items.len() - targets.len();
        if skipped > 0 {
            debug!(operation = operation.as_str(), key = %key, skipped, "unconfirmed items dropped");
        }

        let remote = &self.shared.remote;
        let results = join_all(targets.iter().map(|item| remote.delete(&item.id))).await;
        let mut failed = 0;
        for (item, result) in targets.iter().zip(results) {
            if let Err(err) = result {
                failed += 1;
                warn!(operation = operation.as_str(), key = %item.id, error = %err, "remote delete failed");
            }
        }

        info!(operation = operation.as_str(), key = %key, attempted = targets.len(), failed, "delete fired");
        self.shared.events.publish(Event::UndoExpired {
            key: key.to_string(),
        });
        let outcome = if failed == 0 {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        self.notify(operation, outcome, messages::deleted(items.len(), failed));
        self.mark_stale(operation);

        DeleteReport {
            key,
            attempted: targets.len(),
            failed,
            skipped,
        }
    }

    /// Flip selection of an item in the collection; returns whether it is
    /// now selected.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when the item is not in the collection.
    pub fn toggle_selected(&self, id: &Identifier) -> CoreResult<bool> {
        self.shared.cache.with(|cache| {
            if !cache.contains(id) {
                return Err(CoreError::NotFound { id: id.clone() });
            }
            Ok(self.selection().toggle(id))
        })
    }

    /// Select every candidate present in the collection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Selection`] when there are too many candidates.
    pub fn select_all(&self, candidates: &[Identifier]) -> CoreResult<usize> {
        self.shared.cache.with(|cache| {
            let present: Vec<Identifier> = candidates
                .iter()
                .filter(|id| cache.contains(id))
                .cloned()
                .collect();
            self.selection()
                .select_all(&present)
                .map_err(|err| {
                    warn!(requested = present.len(), error = %err, "select all refused");
                    CoreError::from(err)
                })
        })
    }

    /// Drop the whole selection.
    pub fn clear_selection(&self) {
        self.selection().clear();
    }

    /// Copy of the selection.
    #[must_use]
    pub fn selection_snapshot(&self) -> SelectionSet {
        self.selection().clone()
    }

    /// Selected items in collection order.
    #[must_use]
    pub fn selected_items(&self) -> Vec<Item> {
        self.shared
            .cache
            .with(|cache| self.selection().resolve(cache.items()))
    }

    fn selected_ids(&self) -> Vec<Identifier> {
        self.selected_items()
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    /// Refresh whenever the bus reports the collection stale. Bursts of stale
    /// events collapse into one refresh. The task runs until aborted.
    #[must_use]
    pub fn spawn_stale_watcher(&self) -> JoinHandle<()> {
        let controller = self.clone();
        let mut stream = self.shared.events.subscribe(None);
        tokio::spawn(async move {
            while let Some(envelope) = stream.next().await {
                if !matches!(envelope.event, Event::CollectionStale { .. }) {
                    continue;
                }
                let _ = stream.drain_ready();
                if !controller.shared.cache.is_stale() {
                    continue;
                }
                if let Err(err) = controller.refresh().await {
                    debug!(error = %err, "background refresh failed");
                }
            }
        })
    }

    fn find(&self, id: &Identifier) -> CoreResult<Item> {
        self.shared
            .cache
            .get(id)
            .ok_or_else(|| CoreError::NotFound { id: id.clone() })
    }

    fn prune_selection(&self) {
        let dropped = self
            .shared
            .cache
            .with(|cache| self.selection().prune(cache.items()));
        if dropped > 0 {
            debug!(dropped, "selection pruned");
        }
    }

    fn mark_stale(&self, operation: Operation) {
        self.shared.cache.mark_stale();
        self.shared
            .events
            .publish(Event::CollectionStale { operation });
    }

    fn notify(&self, operation: Operation, outcome: Outcome, message: String) {
        let _ = self.shared.events.notify(operation, outcome, message);
    }

    fn creating(&self) -> MutexGuard<'_, HashSet<Identifier>> {
        self.shared
            .creating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn selection(&self) -> MutexGuard<'_, SelectionSet> {
        self.shared
            .selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_confirmed(id: &Identifier) -> CoreResult<()> {
    if id.is_persisted() {
        Ok(())
    } else {
        Err(CoreError::Unconfirmed { id: id.clone() })
    }
}

/// Keep the local identifier when adopting the server's version of an item.
fn with_local_id(id: &Identifier, mut server: Item) -> Item {
    server.id.clone_from(id);
    server
}
