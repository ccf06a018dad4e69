use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};

use crate::remote::RemoteStore;
use crate::types::{Actor, ActorStatus, ItemId, WorkItem};
use crate::Result;

// ─── Snapshot ─────────────────────────────────────────────────────────────

/// Immutable point-in-time copy of both collections.
///
/// `revision` is the refresh generation that produced it; `0` means nothing
/// has been fetched yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub revision: u64,
    pub items: Vec<WorkItem>,
    pub statuses: Vec<ActorStatus>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            revision: 0,
            items: Vec::new(),
            statuses: Vec::new(),
            refreshed_at: None,
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&WorkItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Status row for `actor`, or its fallback when the remote has none.
    pub fn status_for(&self, actor: Actor) -> ActorStatus {
        self.statuses
            .iter()
            .find(|s| s.actor == actor)
            .cloned()
            .unwrap_or_else(|| ActorStatus::fallback(actor))
    }

    pub fn items_for(&self, actor: Actor) -> impl Iterator<Item = &WorkItem> {
        self.items.iter().filter(move |i| i.owner == actor)
    }
}

// ─── SyncedStore ──────────────────────────────────────────────────────────

struct StoreInner {
    remote: Arc<dyn RemoteStore>,
    issued: AtomicU64,
    in_flight: AtomicUsize,
    closed: AtomicBool,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    last_error: Mutex<Option<String>>,
    trigger: Notify,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StoreInner {
    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn set_last_error(&self, value: Option<String>) {
        let mut slot = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *slot = value;
    }

    async fn run_refresh(&self, generation: u64) -> Result<Arc<Snapshot>> {
        if self.is_closed() {
            return Ok(self.current());
        }
        let _guard = InFlight::enter(&self.in_flight);
        tracing::debug!(generation, "refresh started");

        // Both reads land before anything is published.
        let fetched = tokio::try_join!(self.remote.list_items(), self.remote.list_statuses());

        if self.is_closed() {
            tracing::debug!(generation, "store closed; dropping refresh result");
            return Ok(self.current());
        }

        let (items, statuses) = match fetched {
            Ok(pair) => pair,
            Err(e) => {
                if generation > self.current().revision {
                    tracing::warn!(generation, error = %e, "refresh failed; keeping previous snapshot");
                    self.set_last_error(Some(e.to_string()));
                }
                return Err(e);
            }
        };

        let published = self.snapshot_tx.send_if_modified(|current| {
            if generation <= current.revision {
                return false;
            }
            *current = Arc::new(Snapshot {
                revision: generation,
                items,
                statuses,
                refreshed_at: Some(Utc::now()),
            });
            true
        });

        if published {
            self.set_last_error(None);
            tracing::debug!(generation, "snapshot published");
        } else {
            tracing::debug!(generation, "stale refresh result discarded");
        }
        Ok(self.current())
    }
}

/// In-memory mirror of the remote work items and actor statuses.
///
/// The cache is only ever replaced wholesale by [`SyncedStore::refresh`];
/// nothing patches it in place. Cloning is cheap and every clone shares the
/// same cache.
#[derive(Clone)]
pub struct SyncedStore {
    inner: Arc<StoreInner>,
}

impl SyncedStore {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::empty()));
        Self {
            inner: Arc::new(StoreInner {
                remote,
                issued: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                snapshot_tx,
                last_error: Mutex::new(None),
                trigger: Notify::new(),
            }),
        }
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        Arc::clone(&self.inner.remote)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.current()
    }

    /// Observe snapshot replacements. The receiver always holds the latest
    /// published snapshot; intermediate ones may be skipped.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Message of the most recent failed refresh, cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Re-read both collections and publish them as one snapshot.
    ///
    /// The generation is taken when this is called, not when the future is
    /// first polled, so of two overlapping refreshes the later call wins even
    /// if it resolves first. The returned snapshot is whatever is current
    /// after this refresh settles.
    pub fn refresh(&self) -> impl Future<Output = Result<Arc<Snapshot>>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let generation = inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        async move { inner.run_refresh(generation).await }
    }

    /// Ask the worker for a refresh without waiting for it.
    ///
    /// Any number of requests made while a refresh is running collapse into
    /// one follow-up refresh; the last request is never lost.
    pub fn request_refresh(&self) {
        self.inner.trigger.notify_one();
    }

    /// Serve `request_refresh` calls until `shutdown` flips to `true`.
    pub async fn run_worker(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = self.inner.trigger.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if self.inner.is_closed() {
                break;
            }
            // Failures are logged and recorded by the refresh itself. A
            // shutdown abandons the read instead of waiting on the remote.
            tokio::select! {
                _ = self.refresh() => {}
                _ = shutdown.changed() => {
                    tracing::debug!("shutdown during refresh; result abandoned");
                    break;
                }
            }
        }
        tracing::debug!("refresh worker stopped");
    }

    /// Stop publishing. Refreshes still in flight resolve into no-ops.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::memory::MemoryRemote;
    use crate::remote::{Subscription, SubscriptionId};
    use crate::types::{EventMask, ItemPatch, ItemStatus, NewWorkItem, StatusUpsert, Table};
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    /// Remote whose item reads capture state immediately but only return once
    /// the test releases them.
    pub(crate) struct GatedRemote {
        pub(crate) inner: MemoryRemote,
        gates: Mutex<Vec<Option<oneshot::Sender<()>>>>,
    }

    impl GatedRemote {
        pub(crate) fn new() -> Self {
            Self {
                inner: MemoryRemote::new(),
                gates: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.gates.lock().unwrap().len()
        }

        pub(crate) fn release(&self, call: usize) {
            if let Some(tx) = self.gates.lock().unwrap()[call].take() {
                let _ = tx.send(());
            }
        }

        pub(crate) async fn wait_for_calls(&self, n: usize) {
            for _ in 0..10_000 {
                if self.calls() >= n {
                    return;
                }
                tokio::task::yield_now().await;
            }
            panic!("expected {n} item reads, saw {}", self.calls());
        }
    }

    #[async_trait]
    impl RemoteStore for GatedRemote {
        async fn list_items(&self) -> Result<Vec<WorkItem>> {
            let items = self.inner.list_items().await?;
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push(Some(tx));
            let _ = rx.await;
            Ok(items)
        }
        async fn list_statuses(&self) -> Result<Vec<ActorStatus>> {
            self.inner.list_statuses().await
        }
        async fn fetch_item(&self, id: ItemId) -> Result<Option<WorkItem>> {
            self.inner.fetch_item(id).await
        }
        async fn insert_item(&self, item: NewWorkItem) -> Result<WorkItem> {
            self.inner.insert_item(item).await
        }
        async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<()> {
            self.inner.update_item(id, patch).await
        }
        async fn delete_item(&self, id: ItemId) -> Result<()> {
            self.inner.delete_item(id).await
        }
        async fn upsert_status(&self, status: StatusUpsert) -> Result<ActorStatus> {
            self.inner.upsert_status(status).await
        }
        async fn subscribe(&self, table: Table, events: EventMask) -> Result<Subscription> {
            self.inner.subscribe(table, events).await
        }
        async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
            self.inner.unsubscribe(id).await
        }
    }

    #[tokio::test]
    async fn refresh_replaces_both_collections() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_item("Calibrate sensors", Actor::Agent, ItemStatus::Pending);
        remote
            .upsert_status(StatusUpsert {
                actor: Actor::Operator,
                status_text: "On deck".into(),
                is_online: true,
            })
            .await
            .unwrap();

        let store = SyncedStore::new(remote.clone());
        assert_eq!(store.snapshot().revision, 0);

        let snap = store.refresh().await.unwrap();
        assert_eq!(snap.revision, 1);
        assert_eq!(snap.items.len(), 1);
        assert_eq!(snap.status_for(Actor::Operator).status_text, "On deck");
        assert_eq!(snap.status_for(Actor::Agent).status_text, "STANDBY");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_item("Hold", Actor::Operator, ItemStatus::Pending);
        let store = SyncedStore::new(remote.clone());
        store.refresh().await.unwrap();

        remote.set_offline(true);
        assert!(store.refresh().await.is_err());
        assert_eq!(store.snapshot().items.len(), 1);
        assert!(store.last_error().is_some());

        remote.set_offline(false);
        store.refresh().await.unwrap();
        assert!(store.last_error().is_none());
    }

    #[tokio::test]
    async fn late_result_of_earlier_refresh_is_discarded() {
        let remote = Arc::new(GatedRemote::new());
        remote
            .inner
            .seed_item("from R1", Actor::Operator, ItemStatus::Pending);
        let store = SyncedStore::new(remote.clone());

        let r1 = tokio::spawn(store.refresh());
        remote.wait_for_calls(1).await;

        remote
            .inner
            .seed_item("from R2", Actor::Operator, ItemStatus::Pending);
        let r2 = tokio::spawn(store.refresh());
        remote.wait_for_calls(2).await;

        remote.release(1);
        let after_r2 = r2.await.unwrap().unwrap();
        assert_eq!(after_r2.revision, 2);

        remote.release(0);
        let after_r1 = r1.await.unwrap().unwrap();
        assert_eq!(after_r1.revision, 2);

        let snap = store.snapshot();
        assert_eq!(snap.revision, 2);
        assert_eq!(snap.items.len(), 2);
        assert_eq!(snap.items[0].title, "from R2");
    }

    #[tokio::test]
    async fn burst_of_requests_coalesces_without_losing_the_last() {
        let remote = Arc::new(GatedRemote::new());
        let store = SyncedStore::new(remote.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(store.clone().run_worker(shutdown_rx));

        store.request_refresh();
        remote.wait_for_calls(1).await;
        assert!(store.is_refreshing());

        remote
            .inner
            .seed_item("arrived mid-flight", Actor::Agent, ItemStatus::Pending);
        for _ in 0..10 {
            store.request_refresh();
        }
        remote.release(0);

        remote.wait_for_calls(2).await;
        remote.release(1);
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }

        assert_eq!(remote.calls(), 2);
        assert_eq!(store.snapshot().items.len(), 1);

        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn closed_store_ignores_in_flight_results() {
        let remote = Arc::new(GatedRemote::new());
        remote
            .inner
            .seed_item("never shown", Actor::Operator, ItemStatus::Pending);
        let store = SyncedStore::new(remote.clone());

        let pending = tokio::spawn(store.refresh());
        remote.wait_for_calls(1).await;
        store.close();
        remote.release(0);

        let snap = pending.await.unwrap().unwrap();
        assert_eq!(snap.revision, 0);
        assert!(store.snapshot().items.is_empty());
    }

    #[tokio::test]
    async fn observers_see_new_snapshots() {
        let remote = Arc::new(MemoryRemote::new());
        let store = SyncedStore::new(remote.clone());
        let mut rx = store.subscribe();

        remote.seed_item("Watch me", Actor::Operator, ItemStatus::Pending);
        store.refresh().await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().items[0].title, "Watch me");
    }
}
