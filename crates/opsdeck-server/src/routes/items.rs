use axum::extract::{Path, State};
use axum::Json;
use opsdeck_core::{Actor, ItemId};

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct CreateItemBody {
    pub title: String,
    /// Accepts the wire names (`Z`, `JARVIS`) and the role names.
    pub owner: String,
}

#[derive(serde::Deserialize)]
pub struct RenameBody {
    pub title: String,
}

/// POST /api/items — create a pending work item.
pub async fn create_item(
    State(app): State<AppState>,
    Json(body): Json<CreateItemBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let owner: Actor = body.owner.parse()?;
    let item = app.client.gateway().create(&body.title, owner).await?;
    Ok(Json(serde_json::json!({ "item": item })))
}

/// POST /api/items/:id/toggle — flip completion.
pub async fn toggle_item(
    State(app): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = app.client.gateway().toggle(id).await?;
    Ok(Json(serde_json::json!({ "id": id, "status": status })))
}

/// PUT /api/items/:id/title — rename.
pub async fn rename_item(
    State(app): State<AppState>,
    Path(id): Path<ItemId>,
    Json(body): Json<RenameBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    app.client.gateway().rename(id, &body.title).await?;
    Ok(Json(serde_json::json!({ "id": id, "title": body.title })))
}

/// DELETE /api/items/:id — idempotent delete.
pub async fn delete_item(
    State(app): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<Json<serde_json::Value>, AppError> {
    app.client.gateway().delete(id).await?;
    Ok(Json(serde_json::json!({ "id": id, "deleted": true })))
}
