use opsdeck_core::SyncClient;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<SyncClient>,
    /// Revision of every snapshot published after the state was built.
    pub event_tx: broadcast::Sender<u64>,
}

impl AppState {
    /// Must be called inside a tokio runtime: it spawns the task that turns
    /// snapshot publications into broadcast events.
    pub fn new(client: Arc<SyncClient>) -> Self {
        let (tx, _) = broadcast::channel(64);
        let state = Self {
            client,
            event_tx: tx.clone(),
        };

        let mut updates = state.client.store().subscribe();
        tokio::spawn(async move {
            updates.borrow_and_update();
            while updates.changed().await.is_ok() {
                let revision = updates.borrow_and_update().revision;
                // No receivers is fine; SSE clients come and go.
                let _ = tx.send(revision);
            }
            tracing::debug!("snapshot channel closed; event forwarder stopped");
        });

        state
    }
}
