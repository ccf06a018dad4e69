use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use crate::types::{
    ActorStatus, ChangeEvent, EventMask, ItemId, ItemPatch, NewWorkItem, StatusUpsert, Table,
    WorkItem,
};
use crate::Result;

// ─── SubscriptionId ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub uuid::Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        SubscriptionId(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Subscription ─────────────────────────────────────────────────────────

/// A live change-feed subscription for one table.
///
/// Events arrive on `events`. When the receiver yields `None` the transport
/// has dropped and the subscription is dead; the holder must re-subscribe.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub table: Table,
    pub events: mpsc::Receiver<ChangeEvent>,
}

// ─── RemoteStore ──────────────────────────────────────────────────────────

/// Authoritative record storage with a change-notification feed.
///
/// Implementations guarantee atomic single-record writes and at-least-once
/// delivery of change events. Nothing here is transactional across records.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All work items, newest `created_at` first.
    async fn list_items(&self) -> Result<Vec<WorkItem>>;

    async fn list_statuses(&self) -> Result<Vec<ActorStatus>>;

    async fn fetch_item(&self, id: ItemId) -> Result<Option<WorkItem>>;

    async fn insert_item(&self, item: NewWorkItem) -> Result<WorkItem>;

    /// Fails with [`crate::SyncError::NotFound`] when no row has `id`.
    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<()>;

    /// Deleting an absent row is not an error.
    async fn delete_item(&self, id: ItemId) -> Result<()>;

    async fn upsert_status(&self, status: StatusUpsert) -> Result<ActorStatus>;

    async fn subscribe(&self, table: Table, events: EventMask) -> Result<Subscription>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}
