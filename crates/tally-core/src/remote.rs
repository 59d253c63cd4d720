//! Remote collection boundary.
//!
//! The controller only ever talks to the server through this trait, so it can
//! run against the HTTP client in production and an in-memory fake in tests.

use async_trait::async_trait;

use crate::error::RemoteResult;
use crate::model::{Identifier, Item, ItemPatch};

/// Opaque REST-like collection of items keyed by identifier.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Fetch every item.
    async fn list(&self) -> RemoteResult<Vec<Item>>;

    /// Create an incomplete item; the server assigns its identifier.
    async fn create(&self, title: &str) -> RemoteResult<Item>;

    /// Apply `patch` to the item. `item` is the full desired state, used when
    /// the server refuses partial updates and a full replacement is needed.
    async fn update(&self, item: &Item, patch: &ItemPatch) -> RemoteResult<Item>;

    /// Delete the item.
    async fn delete(&self, id: &Identifier) -> RemoteResult<()>;
}
