use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::{RemoteConfig, SyncConfig};
use crate::edit::{EditSession, EditState};
use crate::feed::{ChangeFeedSubscriber, FeedHealth};
use crate::gateway::MutationGateway;
use crate::memory::MemoryRemote;
use crate::remote::RemoteStore;
use crate::rest::RestRemote;
use crate::store::{Snapshot, SyncedStore};
use crate::types::{ItemId, Table};
use crate::{Result, SyncError};

/// Build the remote described by `config`.
pub fn connect_remote(config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>> {
    match config {
        RemoteConfig::Memory => Ok(Arc::new(MemoryRemote::new())),
        RemoteConfig::Rest(rest) => Ok(Arc::new(RestRemote::new(rest)?)),
    }
}

// ─── SyncClient ───────────────────────────────────────────────────────────

/// A mounted dashboard core: cache, refresh worker, change feed, gateway and
/// the single edit session, wired together.
///
/// ```rust,ignore
/// let client = SyncClient::mount(remote, &SyncConfig::default()).await?;
/// let mut updates = client.store().subscribe();
/// client.gateway().create("Patrol perimeter", Actor::Operator).await?;
/// client.teardown().await;
/// ```
pub struct SyncClient {
    store: SyncedStore,
    gateway: MutationGateway,
    edit: Mutex<EditSession>,
    feed: Option<ChangeFeedSubscriber>,
    worker: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl SyncClient {
    /// Open the change feed, start the refresh worker and load the first
    /// snapshot. A failing first load is logged, not fatal: the feed will
    /// retry once the remote answers.
    pub async fn mount(remote: Arc<dyn RemoteStore>, config: &SyncConfig) -> Result<Self> {
        let store = SyncedStore::new(Arc::clone(&remote));
        let gateway = MutationGateway::new(store.clone());

        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(store.clone().run_worker(shutdown_rx));

        let trigger = store.clone();
        let feed = if config.feed.tables.is_empty() {
            None
        } else {
            Some(ChangeFeedSubscriber::open(
                remote,
                &config.feed.tables,
                config.feed.reconnect.clone(),
                move |table| {
                    tracing::debug!(%table, "change signal; requesting refresh");
                    trigger.request_refresh();
                },
            ))
        };

        if let Err(e) = store.refresh().await {
            tracing::warn!(error = %e, "initial refresh failed");
        }
        tracing::info!(tables = config.feed.tables.len(), "sync client mounted");

        Ok(Self {
            store,
            gateway,
            edit: Mutex::new(EditSession::new()),
            feed,
            worker: Some(worker),
            shutdown,
        })
    }

    pub async fn mount_from_config(config: &SyncConfig) -> Result<Self> {
        Self::mount(connect_remote(&config.remote)?, config).await
    }

    pub fn store(&self) -> &SyncedStore {
        &self.store
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    pub fn feed_health(&self) -> Vec<(Table, FeedHealth)> {
        self.feed
            .as_ref()
            .map(|f| f.health().into_iter().collect())
            .unwrap_or_default()
    }

    // ── Edit session ─────────────────────────────────────────────────────

    pub async fn edit_state(&self) -> EditState {
        let mut session = self.edit.lock().await;
        session.reconcile(&self.store.snapshot());
        session.state().clone()
    }

    /// Start renaming `id`. The record must be in the current snapshot.
    pub async fn begin_edit(&self, id: ItemId) -> Result<EditState> {
        let snapshot = self.store.snapshot();
        let item = snapshot.item(id).ok_or(SyncError::NotFound(id))?;
        let mut session = self.edit.lock().await;
        session.begin(item);
        Ok(session.state().clone())
    }

    pub async fn change_draft(&self, draft: &str) -> Result<EditState> {
        let mut session = self.edit.lock().await;
        if !session.change_draft(draft) {
            return Err(SyncError::Validation("no edit in progress".into()));
        }
        Ok(session.state().clone())
    }

    pub async fn cancel_edit(&self) -> EditState {
        let mut session = self.edit.lock().await;
        session.cancel();
        session.state().clone()
    }

    /// Submit the draft. The session lock is released before the rename goes
    /// out, and the session is idle afterwards whatever the outcome;
    /// `Ok(None)` means there was nothing to commit.
    pub async fn commit_edit(&self) -> Result<Option<ItemId>> {
        let pending = self.edit.lock().await.take_commit();
        match pending {
            Some((id, draft)) => self.gateway.rename(id, &draft).await.map(|()| Some(id)),
            None => Ok(None),
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    /// Stop publishing first, so a refresh still in flight lands as a no-op,
    /// then stop the worker and close every subscription.
    pub async fn teardown(mut self) {
        self.store.close();
        self.shutdown.send_replace(true);
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "refresh worker ended abnormally");
            }
        }
        if let Some(feed) = self.feed.take() {
            feed.close().await;
        }
        tracing::info!("sync client torn down");
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        self.store.close();
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::config::FeedConfig;
    use crate::types::{Actor, ItemStatus, StatusUpsert};
    use std::time::Duration;

    fn config() -> SyncConfig {
        SyncConfig {
            remote: RemoteConfig::Memory,
            feed: FeedConfig {
                tables: Table::ALL.to_vec(),
                reconnect: BackoffPolicy {
                    initial_delay_ms: 1,
                    max_delay_ms: 5,
                    jitter: 0.0,
                    ..BackoffPolicy::default()
                },
            },
        }
    }

    async fn wait_for(
        rx: &mut watch::Receiver<Arc<Snapshot>>,
        mut pred: impl FnMut(&Snapshot) -> bool,
    ) -> Arc<Snapshot> {
        let found = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                {
                    let snap = rx.borrow_and_update();
                    if pred(&snap) {
                        return Arc::clone(&snap);
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await;
        found.expect("snapshot condition not reached")
    }

    #[tokio::test]
    async fn external_writes_reach_the_cache_through_the_feed() {
        let remote = Arc::new(MemoryRemote::new());
        let client = SyncClient::mount(remote.clone(), &config()).await.unwrap();
        let mut rx = client.store().subscribe();

        // Written by another actor, not through the gateway.
        remote.seed_item("Rotate keys", Actor::Agent, ItemStatus::InProgress);
        remote
            .upsert_status(StatusUpsert {
                actor: Actor::Agent,
                status_text: "Rotating".into(),
                is_online: true,
            })
            .await
            .unwrap();

        let snap = wait_for(&mut rx, |s| {
            s.items.len() == 1 && s.status_for(Actor::Agent).status_text == "Rotating"
        })
        .await;
        assert_eq!(snap.items[0].title, "Rotate keys");

        client.teardown().await;
    }

    #[tokio::test]
    async fn teardown_closes_subscriptions() {
        let remote = Arc::new(MemoryRemote::new());
        let client = SyncClient::mount(remote.clone(), &config()).await.unwrap();
        for _ in 0..200 {
            if remote.subscriber_count() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(remote.subscriber_count(), 2);

        client.teardown().await;
        assert_eq!(remote.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn cache_catches_up_after_feed_disconnect() {
        let remote = Arc::new(MemoryRemote::new());
        let client = SyncClient::mount(remote.clone(), &config()).await.unwrap();
        let mut rx = client.store().subscribe();

        remote.disconnect_feeds();
        remote.seed_item("Written while disconnected", Actor::Operator, ItemStatus::Pending);

        wait_for(&mut rx, |s| s.items.len() == 1).await;
        client.teardown().await;
    }

    #[tokio::test]
    async fn edit_session_is_exclusive_across_the_client() {
        let remote = Arc::new(MemoryRemote::new());
        let a = remote.seed_item("A", Actor::Operator, ItemStatus::Pending);
        let b = remote.seed_item("B", Actor::Agent, ItemStatus::Pending);
        let client = SyncClient::mount(remote.clone(), &config()).await.unwrap();

        client.begin_edit(a.id).await.unwrap();
        client.change_draft("A draft").await.unwrap();
        let state = client.begin_edit(b.id).await.unwrap();
        assert_eq!(
            state,
            EditState::Editing {
                id: b.id,
                draft: "B".into()
            }
        );

        client.change_draft("B renamed").await.unwrap();
        assert_eq!(client.commit_edit().await.unwrap(), Some(b.id));
        assert_eq!(client.edit_state().await, EditState::Idle);

        let snap = client.snapshot();
        assert_eq!(snap.item(a.id).unwrap().title, "A");
        assert_eq!(snap.item(b.id).unwrap().title, "B renamed");

        client.teardown().await;
    }

    #[tokio::test]
    async fn draft_without_session_is_rejected() {
        let client = SyncClient::mount(Arc::new(MemoryRemote::new()), &config())
            .await
            .unwrap();
        assert!(matches!(
            client.change_draft("orphan").await,
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(
            client.begin_edit(ItemId(77)).await,
            Err(SyncError::NotFound(ItemId(77)))
        ));
        client.teardown().await;
    }

    #[tokio::test]
    async fn mount_survives_unreachable_remote() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_offline(true);
        let client = SyncClient::mount(remote.clone(), &config()).await.unwrap();
        assert_eq!(client.snapshot().revision, 0);
        assert!(client.store().last_error().is_some());
        client.teardown().await;
    }

    #[tokio::test]
    async fn failed_commit_still_ends_session() {
        let remote = Arc::new(MemoryRemote::new());
        let item = remote.seed_item("Draft me", Actor::Agent, ItemStatus::InProgress);
        let client = SyncClient::mount(remote.clone(), &config()).await.unwrap();

        client.begin_edit(item.id).await.unwrap();
        client.change_draft("   ").await.unwrap();
        assert!(matches!(
            client.commit_edit().await,
            Err(SyncError::Validation(_))
        ));
        assert_eq!(client.edit_state().await, EditState::Idle);

        client.begin_edit(item.id).await.unwrap();
        remote.delete_item(item.id).await.unwrap();
        assert!(matches!(
            client.commit_edit().await,
            Err(SyncError::NotFound(id)) if id == item.id
        ));
        assert_eq!(client.commit_edit().await.unwrap(), None);

        client.teardown().await;
    }

    #[tokio::test]
    async fn teardown_abandons_refresh_in_flight() {
        use crate::store::tests::GatedRemote;

        let remote = Arc::new(GatedRemote::new());
        let quiet = SyncConfig {
            feed: FeedConfig {
                tables: vec![],
                ..FeedConfig::default()
            },
            ..config()
        };

        // Let the mount-time read through.
        let opener = {
            let remote = Arc::clone(&remote);
            tokio::spawn(async move {
                remote.wait_for_calls(1).await;
                remote.release(0);
            })
        };
        let client = SyncClient::mount(remote.clone(), &quiet).await.unwrap();
        opener.await.unwrap();
        assert_eq!(client.snapshot().revision, 1);

        let mut rx = client.store().subscribe();
        rx.borrow_and_update();
        remote
            .inner
            .seed_item("Arrives during teardown", Actor::Operator, ItemStatus::Pending);
        client.store().request_refresh();
        remote.wait_for_calls(2).await;

        let store = client.store().clone();
        tokio::time::timeout(Duration::from_secs(1), client.teardown())
            .await
            .expect("teardown waited on the remote");

        remote.release(1);
        tokio::task::yield_now().await;

        let snap = store.snapshot();
        assert_eq!(snap.revision, 1);
        assert!(snap.items.is_empty());
        assert!(!rx.has_changed().unwrap_or(false));
    }
}
