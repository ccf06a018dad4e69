use axum::extract::State;
use axum::Json;
use opsdeck_core::{Actor, Snapshot, SyncClient};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/snapshot — the latest published snapshot plus sync health.
pub async fn get_snapshot(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = app.client.snapshot();
    Ok(Json(snapshot_json(&app.client, &snapshot)))
}

/// POST /api/refresh — force a full re-read of both tables.
pub async fn refresh(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = app.client.store().refresh().await?;
    Ok(Json(snapshot_json(&app.client, &snapshot)))
}

fn snapshot_json(client: &SyncClient, snapshot: &Snapshot) -> serde_json::Value {
    let statuses: Vec<_> = Actor::ALL
        .iter()
        .map(|&actor| snapshot.status_for(actor))
        .collect();
    let feed: serde_json::Map<String, serde_json::Value> = client
        .feed_health()
        .into_iter()
        .map(|(table, health)| {
            (
                table.as_str().to_string(),
                serde_json::to_value(health).unwrap_or(serde_json::Value::Null),
            )
        })
        .collect();
    let store = client.store();

    serde_json::json!({
        "revision": snapshot.revision,
        "refreshed_at": snapshot.refreshed_at,
        "refreshing": store.is_refreshing(),
        "last_error": store.last_error(),
        "items": snapshot.items,
        "statuses": statuses,
        "feed": feed,
    })
}
