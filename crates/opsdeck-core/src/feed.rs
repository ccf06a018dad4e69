use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backoff::BackoffPolicy;
use crate::remote::RemoteStore;
use crate::types::{EventMask, Table};

/// Connection state of one table's change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedHealth {
    Connecting,
    Live,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted; the cache only moves on explicit refresh.
    Stopped,
    Closed,
}

type HealthMap = Arc<Mutex<BTreeMap<Table, FeedHealth>>>;

fn set_health(health: &HealthMap, table: Table, state: FeedHealth) {
    health
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(table, state);
}

// ─── ChangeFeedSubscriber ─────────────────────────────────────────────────

/// Holds one live subscription per watched table and calls `on_change`
/// whenever a table reports a change.
///
/// Notifications are treated as bare signals. After every successful
/// (re)subscribe the callback fires once as well, since anything that
/// happened while the feed was down was never delivered.
///
/// Dropping the subscriber signals every table task to unsubscribe and exit;
/// [`ChangeFeedSubscriber::close`] does the same and waits for them.
pub struct ChangeFeedSubscriber {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    health: HealthMap,
}

impl ChangeFeedSubscriber {
    pub fn open<F>(
        remote: Arc<dyn RemoteStore>,
        tables: &[Table],
        backoff: BackoffPolicy,
        on_change: F,
    ) -> Self
    where
        F: Fn(Table) + Send + Sync + 'static,
    {
        let (shutdown, _) = watch::channel(false);
        let on_change: Arc<dyn Fn(Table) + Send + Sync> = Arc::new(on_change);
        let health: HealthMap = Arc::new(Mutex::new(BTreeMap::new()));

        let unique: BTreeSet<Table> = tables.iter().copied().collect();
        let tasks = unique
            .into_iter()
            .map(|table| {
                set_health(&health, table, FeedHealth::Connecting);
                let feed = TableFeed {
                    table,
                    remote: Arc::clone(&remote),
                    backoff: backoff.clone(),
                    on_change: Arc::clone(&on_change),
                    health: Arc::clone(&health),
                };
                tokio::spawn(feed.run(shutdown.subscribe()))
            })
            .collect();

        Self {
            shutdown,
            tasks,
            health,
        }
    }

    pub fn health(&self) -> BTreeMap<Table, FeedHealth> {
        self.health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// `true` when every watched table has a live subscription.
    pub fn is_live(&self) -> bool {
        self.health()
            .values()
            .all(|h| matches!(h, FeedHealth::Live))
    }

    /// Unsubscribe every table and wait for the feed tasks to finish.
    pub async fn close(mut self) {
        self.shutdown.send_replace(true);
        let tasks = std::mem::take(&mut self.tasks);
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "change feed task ended abnormally");
            }
        }
    }
}

impl Drop for ChangeFeedSubscriber {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

// ─── Per-table task ───────────────────────────────────────────────────────

struct TableFeed {
    table: Table,
    remote: Arc<dyn RemoteStore>,
    backoff: BackoffPolicy,
    on_change: Arc<dyn Fn(Table) + Send + Sync>,
    health: HealthMap,
}

impl TableFeed {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let table = self.table;
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let subscribed = tokio::select! {
                res = self.remote.subscribe(table, EventMask::ALL) => res,
                _ = shutdown.changed() => break,
            };

            match subscribed {
                Ok(mut sub) => {
                    attempt = 0;
                    set_health(&self.health, table, FeedHealth::Live);
                    tracing::debug!(%table, subscription = %sub.id, "change feed live");
                    (self.on_change)(table);

                    let stopping = loop {
                        tokio::select! {
                            event = sub.events.recv() => match event {
                                Some(event) => {
                                    tracing::trace!(%table, kind = ?event.kind, "change notification");
                                    (self.on_change)(event.table);
                                }
                                None => break false,
                            },
                            _ = shutdown.changed() => break true,
                        }
                    };

                    if let Err(e) = self.remote.unsubscribe(sub.id).await {
                        tracing::warn!(%table, error = %e, "unsubscribe failed");
                    }
                    if stopping {
                        break;
                    }
                    tracing::warn!(%table, "change feed disconnected");
                }
                Err(e) => {
                    tracing::warn!(%table, attempt, error = %e, "subscribe failed");
                }
            }

            attempt += 1;
            if self.backoff.exhausted(attempt) {
                tracing::warn!(%table, "reconnect attempts exhausted; live updates stopped");
                set_health(&self.health, table, FeedHealth::Stopped);
                return;
            }
            set_health(&self.health, table, FeedHealth::Reconnecting { attempt });
            let delay = self.backoff.delay(attempt);
            tracing::debug!(%table, attempt, delay_ms = delay.as_millis() as u64, "reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        set_health(&self.health, table, FeedHealth::Closed);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
