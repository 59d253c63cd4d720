#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Notification bus for the Tally list controller.
//!
//! Every mutating operation reports its outcome here (in-flight, succeeded,
//! failed, or failed-and-reverted), alongside undo offers and staleness
//! signals that prompt the view layer to refresh. Internally the bus is a
//! `tokio::broadcast` channel paired with a bounded replay ring, so a view that
//! attaches late can catch up on recent notifications by id.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 256;

/// Operations that report outcomes through the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Fetch of the remote collection.
    Refresh,
    /// Item creation.
    Create,
    /// Completed-flag toggle on a single item.
    Toggle,
    /// Title edit on a single item.
    Edit,
    /// Completed-flag change across several items.
    BulkUpdate,
    /// Deferred delete of a single item.
    Delete,
    /// Deferred delete of a batch of items.
    BulkDelete,
    /// Cancellation of a deferred delete.
    Undo,
}

impl Operation {
    /// Short label used in log fields and rendered notifications.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Create => "create",
            Self::Toggle => "toggle",
            Self::Edit => "edit",
            Self::BulkUpdate => "bulk_update",
            Self::Delete => "delete",
            Self::BulkDelete => "bulk_delete",
            Self::Undo => "undo",
        }
    }
}

/// Phase or terminal result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The operation has started and is waiting on the remote.
    InFlight,
    /// The operation completed.
    Succeeded,
    /// The operation failed; local state was left as is.
    Failed,
    /// The operation failed and its optimistic change was rolled back.
    Reverted,
}

impl Outcome {
    /// Whether this outcome closes the operation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InFlight)
    }

    /// Whether this outcome is a failure of either kind.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Reverted)
    }
}

/// User-facing notification payload (rendered as a toast by the view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Operation the notice reports on.
    pub operation: Operation,
    /// Phase or result.
    pub outcome: Outcome,
    /// Display message.
    pub message: String,
}

/// Typed events surfaced by the list controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Operation progress or result.
    Notice(Notice),
    /// A deferred delete was armed and can be undone until it expires.
    UndoOffered {
        /// Pending-delete key to pass back when undoing.
        key: String,
        /// Number of items held by the entry.
        count: usize,
        /// Grace window length in milliseconds.
        window_ms: u64,
    },
    /// The undo window for a deferred delete closed and the delete fired.
    UndoExpired {
        /// Pending-delete key that fired.
        key: String,
    },
    /// The local collection may diverge from the remote and should be refreshed.
    CollectionStale {
        /// Operation whose settlement raised the flag.
        operation: Operation,
    },
    /// The local collection was replaced by a fresh remote listing.
    CollectionRefreshed {
        /// Number of items now held locally.
        count: usize,
    },
}

impl Event {
    /// Machine-friendly discriminator for renderers and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Notice(_) => "notice",
            Self::UndoOffered { .. } => "undo_offered",
            Self::UndoExpired { .. } => "undo_expired",
            Self::CollectionStale { .. } => "collection_stale",
            Self::CollectionRefreshed { .. } => "collection_refreshed",
        }
    }

    /// Build a notice event.
    #[must_use]
    pub fn notice(operation: Operation, outcome: Outcome, message: impl Into<String>) -> Self {
        Self::Notice(Notice {
            operation,
            outcome,
            message: message.into(),
        })
    }
}

/// Metadata wrapper around events carrying the id and emission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Sequential event identifier.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a bus whose broadcast channel and replay ring share `capacity`.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event, assigning it the next sequential identifier.
    ///
    /// Id assignment, buffering and the broadcast all happen under the ring
    /// lock, so subscribers see ids in increasing order.
    pub fn publish(&self, event: Event) -> EventId {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        if buffer.len() == self.replay_capacity {
            buffer.pop_front();
        }
        buffer.push_back(envelope.clone());

        // No receivers is fine: the replay ring still holds the event.
        let _ = self.sender.send(envelope);
        id
    }

    /// Publish a notice.
    pub fn notify(
        &self,
        operation: Operation,
        outcome: Outcome,
        message: impl Into<String>,
    ) -> EventId {
        self.publish(Event::notice(operation, outcome, message))
    }

    /// Subscribe, replaying buffered events newer than `since_id` first.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let receiver = self.sender.subscribe();
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            backlog.extend(buffer.iter().filter(|item| item.id > since).cloned());
        }
        drop(buffer);
        EventStream {
            backlog,
            receiver,
            last_seen: since_id.unwrap_or(0),
        }
    }

    /// Returns the last assigned identifier, if anything was published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.back().map(|event| event.id)
    }

    /// Copy of the buffered events newer than `since_id`.
    #[must_use]
    pub fn recent(&self, since_id: EventId) -> Vec<EventEnvelope> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer
            .iter()
            .filter(|item| item.id > since_id)
            .cloned()
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream yielding events from the replay backlog, then from the live channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    last_seen: EventId,
}

impl EventStream {
    /// Receive the next event, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            self.last_seen = event.id;
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                // The live channel may repeat what the backlog already replayed.
                Ok(event) if event.id <= self.last_seen => {}
                Ok(event) => {
                    self.last_seen = event.id;
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain whatever is immediately available without waiting.
    pub fn drain_ready(&mut self) -> Vec<EventEnvelope> {
        let mut ready: Vec<EventEnvelope> = self.backlog.drain(..).collect();
        if let Some(last) = ready.last() {
            self.last_seen = last.id;
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.id <= self.last_seen => {}
                Ok(event) => {
                    self.last_seen = event.id;
                    ready.push(event);
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale(operation: Operation) -> Event {
        Event::CollectionStale { operation }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for _ in 0..5 {
            last_id = bus.publish(stale(Operation::Toggle));
        }
        assert_eq!(last_id, 5);

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event);
            }
        }

        assert_eq!(received.len(), 3);
        assert_eq!(received.first().map(|e| e.id), Some(3));
        assert_eq!(received.last().map(|e| e.id), Some(5));
    }

    #[tokio::test]
    async fn live_events_follow_backlog_without_duplicates() {
        let bus = EventBus::with_capacity(8);
        let _ = bus.publish(stale(Operation::Create));
        let mut stream = bus.subscribe(Some(0));
        let _ = bus.notify(Operation::Create, Outcome::Succeeded, "Created");

        let first = stream.next().await.map(|e| e.id);
        let second = stream.next().await.map(|e| e.id);
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
        assert!(stream.drain_ready().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishers_are_received_in_id_order() {
        let bus = EventBus::with_capacity(512);
        let mut stream = bus.subscribe(None);

        let publishers: Vec<_> = (0..4)
            .map(|_| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        let _ = bus.publish(stale(Operation::BulkUpdate));
                    }
                })
            })
            .collect();
        for publisher in publishers {
            assert!(publisher.await.is_ok());
        }

        let mut ids = Vec::new();
        for _ in 0..400 {
            ids.push(stream.next().await.map(|e| e.id));
        }
        let expected: Vec<_> = (1..=400).map(Some).collect();
        assert_eq!(ids, expected);
        assert!(stream.drain_ready().is_empty());
    }

    #[test]
    fn replay_ring_drops_oldest() {
        let bus = EventBus::with_capacity(2);
        for _ in 0..3 {
            let _ = bus.publish(stale(Operation::Edit));
        }
        let ids: Vec<_> = bus.recent(0).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(bus.last_event_id(), Some(3));
    }

    #[test]
    fn outcome_classification() {
        assert!(!Outcome::InFlight.is_terminal());
        assert!(Outcome::Reverted.is_terminal());
        assert!(Outcome::Reverted.is_failure());
        assert!(Outcome::Failed.is_failure());
        assert!(!Outcome::Succeeded.is_failure());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::UndoOffered {
            key: "item:1".into(),
            count: 1,
            window_ms: 5_000,
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["type"], "undo_offered");
        assert_eq!(event.kind(), "undo_offered");
    }
}
