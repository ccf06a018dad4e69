use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::remote::{RemoteStore, Subscription, SubscriptionId};
use crate::types::{
    Actor, ActorStatus, ChangeEvent, ChangeKind, EventMask, ItemId, ItemPatch, ItemStatus,
    NewWorkItem, StatusUpsert, Table, WorkItem,
};
use crate::{Result, SyncError};

const FEED_CAPACITY: usize = 64;

struct Subscriber {
    table: Table,
    mask: EventMask,
    tx: mpsc::Sender<ChangeEvent>,
}

#[derive(Default)]
struct Inner {
    items: BTreeMap<ItemId, WorkItem>,
    statuses: BTreeMap<Actor, ActorStatus>,
    next_item_id: i64,
    next_status_id: i64,
    subscribers: HashMap<SubscriptionId, Subscriber>,
    writes: u64,
    subscribe_calls: u64,
    offline: bool,
    refuse_subscribe: bool,
}

impl Inner {
    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(SyncError::Transport("remote store unavailable".into()));
        }
        Ok(())
    }

    fn notify(&mut self, table: Table, kind: ChangeKind) {
        let event = ChangeEvent { table, kind };
        self.subscribers.retain(|_, sub| {
            if sub.table != table || !sub.mask.contains(kind) {
                return true;
            }
            match sub.tx.try_send(event) {
                Ok(()) => true,
                // A full queue already holds an undelivered signal for this table.
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    fn insert(&mut self, item: NewWorkItem) -> WorkItem {
        self.next_item_id += 1;
        let record = WorkItem {
            id: ItemId(self.next_item_id),
            title: item.title,
            owner: item.owner,
            status: item.status,
            created_at: Utc::now(),
        };
        self.items.insert(record.id, record.clone());
        self.notify(Table::Tasks, ChangeKind::Insert);
        record
    }
}

/// In-process [`RemoteStore`] used for offline runs and tests.
///
/// Behaves like the hosted store: ids and timestamps are assigned on insert,
/// every write fans out a change event, and `delete` is idempotent. The
/// `set_offline` / `disconnect_feeds` hooks simulate transport failures.
#[derive(Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a row as an external actor would; not counted in `write_count`.
    pub fn seed_item(&self, title: &str, owner: Actor, status: ItemStatus) -> WorkItem {
        self.lock().insert(NewWorkItem {
            title: title.to_string(),
            owner,
            status,
        })
    }

    /// Writes accepted through the [`RemoteStore`] interface.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn subscribe_calls(&self) -> u64 {
        self.lock().subscribe_calls
    }

    /// While offline every call fails with [`SyncError::Transport`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make `subscribe` fail with [`SyncError::Subscription`].
    pub fn set_refuse_subscribe(&self, refuse: bool) {
        self.lock().refuse_subscribe = refuse;
    }

    /// Drop every live feed, as a broken websocket would.
    pub fn disconnect_feeds(&self) {
        self.lock().subscribers.clear();
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list_items(&self) -> Result<Vec<WorkItem>> {
        let inner = self.lock();
        inner.check_online()?;
        let mut items: Vec<WorkItem> = inner.items.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn list_statuses(&self) -> Result<Vec<ActorStatus>> {
        let inner = self.lock();
        inner.check_online()?;
        Ok(inner.statuses.values().cloned().collect())
    }

    async fn fetch_item(&self, id: ItemId) -> Result<Option<WorkItem>> {
        let inner = self.lock();
        inner.check_online()?;
        Ok(inner.items.get(&id).cloned())
    }

    async fn insert_item(&self, item: NewWorkItem) -> Result<WorkItem> {
        let mut inner = self.lock();
        inner.check_online()?;
        inner.writes += 1;
        Ok(inner.insert(item))
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<()> {
        let mut inner = self.lock();
        inner.check_online()?;
        let item = inner.items.get_mut(&id).ok_or(SyncError::NotFound(id))?;
        patch.apply(item);
        inner.writes += 1;
        inner.notify(Table::Tasks, ChangeKind::Update);
        Ok(())
    }

    async fn delete_item(&self, id: ItemId) -> Result<()> {
        let mut inner = self.lock();
        inner.check_online()?;
        inner.writes += 1;
        if inner.items.remove(&id).is_some() {
            inner.notify(Table::Tasks, ChangeKind::Delete);
        }
        Ok(())
    }

    async fn upsert_status(&self, status: StatusUpsert) -> Result<ActorStatus> {
        let mut inner = self.lock();
        inner.check_online()?;
        inner.writes += 1;

        let existing_id = inner.statuses.get(&status.actor).map(|s| s.id);
        let (id, kind) = match existing_id {
            Some(id) => (id, ChangeKind::Update),
            None => {
                inner.next_status_id += 1;
                (inner.next_status_id, ChangeKind::Insert)
            }
        };
        let record = ActorStatus {
            id,
            actor: status.actor,
            status_text: status.status_text,
            is_online: status.is_online,
            updated_at: Utc::now(),
        };
        inner.statuses.insert(record.actor, record.clone());
        inner.notify(Table::Statuses, kind);
        Ok(record)
    }

    async fn subscribe(&self, table: Table, events: EventMask) -> Result<Subscription> {
        let mut inner = self.lock();
        inner.subscribe_calls += 1;
        if inner.offline || inner.refuse_subscribe {
            return Err(SyncError::Subscription(format!(
                "cannot open feed for '{table}'"
            )));
        }
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let id = SubscriptionId::new();
        inner.subscribers.insert(
            id,
            Subscriber {
                table,
                mask: events,
                tx,
            },
        );
        Ok(Subscription {
            id,
            table,
            events: rx,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.lock().subscribers.remove(&id);
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
