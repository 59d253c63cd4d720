#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! List state controller for Tally.
//!
//! Layout:
//! - `model.rs`: items, identifiers and patch bodies.
//! - `cache.rs`: local cache of the collection.
//! - `remote.rs`: remote collection trait implemented by the HTTP client.
//! - `controller.rs`: optimistic create/update, deferred delete, refresh.
//! - `pending.rs`: armed deletes awaiting their undo window.
//! - `projection.rs` / `view.rs`: filtering, sorting, paging and debounce.
//! - `selection.rs`: multi-select bookkeeping.
//! - `location.rs`: shareable query string and session mirror.

pub mod cache;
pub mod controller;
pub mod error;
pub mod location;
pub mod messages;
pub mod model;
pub mod pending;
pub mod projection;
pub mod remote;
pub mod selection;
pub mod validate;
pub mod view;

pub use cache::{Cache, LocalCache, Snapshot};
pub use controller::{BulkReport, ControllerSettings, DeleteReport, ListController};
pub use error::{CoreError, CoreResult, RemoteError, RemoteResult, SelectionError, SessionError};
pub use location::{FileSessionStore, MemorySessionStore, SESSION_KEY, SessionStore};
pub use model::{Identifier, Item, ItemPatch, NewItem};
pub use pending::{PendingDelete, PendingKey, PendingTracker};
pub use projection::{
    EmptyState, PageSize, Projection, SortMode, StatusFilter, ViewParams, project,
};
pub use remote::RemoteCollection;
pub use selection::SelectionSet;
pub use view::ViewState;
