use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::RestConfig;
use crate::remote::{RemoteStore, Subscription, SubscriptionId};
use crate::types::{
    ActorStatus, ChangeEvent, ChangeKind, EventMask, ItemId, ItemPatch, NewWorkItem,
    StatusUpsert, Table, WorkItem,
};
use crate::{Result, SyncError};

/// Consecutive failed polls after which a feed is reported as disconnected.
const MAX_POLL_FAILURES: u32 = 3;

// ─── Http ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Http {
    client: reqwest::Client,
    base: String,
    api_key: Option<String>,
}

impl Http {
    fn url(&self, table: Table, query: &str) -> String {
        format!("{}/rest/v1/{}?{}", self.base, table, query)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            req = req
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"));
        }
        req
    }

    async fn send(req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SyncError::Transport(format!("remote returned {status}: {body}")))
    }

    async fn json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        let resp = Self::send(req).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn rows(&self, table: Table) -> Result<BTreeMap<String, Value>> {
        let url = self.url(table, "select=*");
        let rows: Vec<Value> = Self::json(self.request(Method::GET, &url)).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("id").map(Value::to_string).unwrap_or_default(), row))
            .collect())
    }
}

/// Classify what changed between two fetches of the same table.
pub fn diff_rows(
    before: &BTreeMap<String, Value>,
    after: &BTreeMap<String, Value>,
) -> Vec<ChangeKind> {
    let mut kinds = Vec::new();
    if after.keys().any(|k| !before.contains_key(k)) {
        kinds.push(ChangeKind::Insert);
    }
    if after
        .iter()
        .any(|(k, v)| before.get(k).is_some_and(|old| old != v))
    {
        kinds.push(ChangeKind::Update);
    }
    if before.keys().any(|k| !after.contains_key(k)) {
        kinds.push(ChangeKind::Delete);
    }
    kinds
}

// ─── RestRemote ───────────────────────────────────────────────────────────

/// [`RemoteStore`] over a PostgREST-style HTTP API.
///
/// CRUD maps onto `/rest/v1/<table>` with `id=eq.N` filters. The change feed
/// polls each subscribed table and emits one event per kind of difference it
/// sees; several polls failing in a row close the feed so the subscriber
/// reconnects.
pub struct RestRemote {
    http: Http,
    poll_interval: Duration,
    pollers: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl RestRemote {
    pub fn new(config: &RestConfig) -> Result<Self> {
        Self::with_api_key(config, config.api_key())
    }

    pub fn with_api_key(config: &RestConfig, api_key: Option<String>) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(SyncError::Config("rest remote requires a url".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http: Http {
                client,
                base: config.url.trim_end_matches('/').to_string(),
                api_key,
            },
            poll_interval: config.poll_interval(),
            pollers: Mutex::new(HashMap::new()),
        })
    }

    fn pollers(&self) -> MutexGuard<'_, HashMap<SubscriptionId, JoinHandle<()>>> {
        self.pollers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for RestRemote {
    fn drop(&mut self) {
        for (_, handle) in self.pollers().drain() {
            handle.abort();
        }
    }
}

#[async_trait]
impl RemoteStore for RestRemote {
    async fn list_items(&self) -> Result<Vec<WorkItem>> {
        let url = self
            .http
            .url(Table::Tasks, "select=*&order=created_at.desc");
        Http::json(self.http.request(Method::GET, &url)).await
    }

    async fn list_statuses(&self) -> Result<Vec<ActorStatus>> {
        let url = self.http.url(Table::Statuses, "select=*");
        Http::json(self.http.request(Method::GET, &url)).await
    }

    async fn fetch_item(&self, id: ItemId) -> Result<Option<WorkItem>> {
        let url = self.http.url(Table::Tasks, &format!("select=*&id=eq.{id}"));
        let rows: Vec<WorkItem> = Http::json(self.http.request(Method::GET, &url)).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_item(&self, item: NewWorkItem) -> Result<WorkItem> {
        let url = self.http.url(Table::Tasks, "select=*");
        let req = self
            .http
            .request(Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(&item);
        let rows: Vec<WorkItem> = Http::json(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::Transport("insert returned no rows".into()))
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch) -> Result<()> {
        let url = self.http.url(Table::Tasks, &format!("id=eq.{id}"));
        let req = self
            .http
            .request(Method::PATCH, &url)
            .header("Prefer", "return=representation")
            .json(&patch);
        let rows: Vec<Value> = Http::json(req).await?;
        if rows.is_empty() {
            return Err(SyncError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_item(&self, id: ItemId) -> Result<()> {
        let url = self.http.url(Table::Tasks, &format!("id=eq.{id}"));
        Http::send(self.http.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn upsert_status(&self, status: StatusUpsert) -> Result<ActorStatus> {
        let url = self.http.url(Table::Statuses, "on_conflict=user_id");
        let mut body = serde_json::to_value(&status)?;
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".into(), serde_json::to_value(Utc::now())?);
        }
        let req = self
            .http
            .request(Method::POST, &url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body);
        let rows: Vec<ActorStatus> = Http::json(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::Transport("upsert returned no rows".into()))
    }

    async fn subscribe(&self, table: Table, events: EventMask) -> Result<Subscription> {
        let baseline = self
            .http
            .rows(table)
            .await
            .map_err(|e| SyncError::Subscription(format!("cannot poll '{table}': {e}")))?;

        let (tx, rx) = mpsc::channel(16);
        let id = SubscriptionId::new();
        let http = self.http.clone();
        let interval = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut last = baseline;
            let mut failures = 0u32;
            loop {
                tokio::time::sleep(interval).await;
                if tx.is_closed() {
                    break;
                }
                match http.rows(table).await {
                    Ok(rows) => {
                        failures = 0;
                        for kind in diff_rows(&last, &rows) {
                            if events.contains(kind)
                                && tx.send(ChangeEvent { table, kind }).await.is_err()
                            {
                                return;
                            }
                        }
                        last = rows;
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::debug!(%table, failures, error = %e, "poll failed");
                        if failures >= MAX_POLL_FAILURES {
                            tracing::warn!(%table, "polling feed lost the remote");
                            break;
                        }
                    }
                }
            }
        });

        self.pollers().insert(id, handle);
        Ok(Subscription {
            id,
            table,
            events: rx,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        if let Some(handle) = self.pollers().remove(&id) {
            handle.abort();
        }
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
