use std::sync::Arc;

use crate::remote::RemoteStore;
use crate::store::SyncedStore;
use crate::types::{
    Actor, ActorStatus, ItemId, ItemPatch, ItemStatus, NewWorkItem, StatusUpsert, WorkItem,
};
use crate::{Result, SyncError};

/// Write intents against the remote store.
///
/// Every operation writes first and then refreshes the [`SyncedStore`]; the
/// cache is never patched with the written value. Until that refresh lands
/// the cache may lag the caller's own write.
#[derive(Clone)]
pub struct MutationGateway {
    remote: Arc<dyn RemoteStore>,
    store: SyncedStore,
}

impl MutationGateway {
    pub fn new(store: SyncedStore) -> Self {
        Self {
            remote: store.remote(),
            store,
        }
    }

    pub fn store(&self) -> &SyncedStore {
        &self.store
    }

    pub async fn create(&self, title: &str, owner: Actor) -> Result<WorkItem> {
        validate_title(title)?;
        let item = self
            .remote
            .insert_item(NewWorkItem {
                title: title.to_string(),
                owner,
                status: ItemStatus::Pending,
            })
            .await?;
        tracing::info!(id = %item.id, %owner, "work item created");
        self.reconcile().await;
        Ok(item)
    }

    /// Flip completion and return the status that was written.
    pub async fn toggle(&self, id: ItemId) -> Result<ItemStatus> {
        let outcome = self.toggle_remote(id).await;
        self.settle(&outcome).await;
        let status = outcome?;
        tracing::info!(%id, %status, "work item toggled");
        Ok(status)
    }

    async fn toggle_remote(&self, id: ItemId) -> Result<ItemStatus> {
        let current = self
            .remote
            .fetch_item(id)
            .await?
            .ok_or(SyncError::NotFound(id))?;
        let next = current.status.toggled();
        self.remote.update_item(id, ItemPatch::status(next)).await?;
        Ok(next)
    }

    /// Change the title only; status is left untouched.
    pub async fn rename(&self, id: ItemId, title: &str) -> Result<()> {
        validate_title(title)?;
        let outcome = self.remote.update_item(id, ItemPatch::title(title)).await;
        self.settle(&outcome).await;
        outcome?;
        tracing::info!(%id, "work item renamed");
        Ok(())
    }

    /// Remove a work item. Deleting an id that is already gone succeeds.
    pub async fn delete(&self, id: ItemId) -> Result<()> {
        self.remote.delete_item(id).await?;
        tracing::info!(%id, "work item deleted");
        self.reconcile().await;
        Ok(())
    }

    /// Publish an actor's presence line; one row per actor.
    pub async fn upsert_status(
        &self,
        actor: Actor,
        status_text: &str,
        is_online: bool,
    ) -> Result<ActorStatus> {
        let status = self
            .remote
            .upsert_status(StatusUpsert {
                actor,
                status_text: status_text.to_string(),
                is_online,
            })
            .await?;
        tracing::info!(%actor, is_online, "actor status updated");
        self.reconcile().await;
        Ok(status)
    }

    /// Refresh after a write attempt. A missing row still refreshes so the
    /// cache stops showing it; transport failures leave the cache alone.
    async fn settle<T>(&self, outcome: &Result<T>) {
        match outcome {
            Ok(_) | Err(SyncError::NotFound(_)) => self.reconcile().await,
            Err(_) => {}
        }
    }

    async fn reconcile(&self) {
        if let Err(e) = self.store.refresh().await {
            tracing::warn!(error = %e, "refresh after write failed; waiting for change feed");
        }
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(SyncError::Validation("title must not be empty".into()));
    }
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────
