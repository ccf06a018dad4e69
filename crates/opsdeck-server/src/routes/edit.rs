use axum::extract::State;
use axum::Json;
use opsdeck_core::{EditState, ItemId};

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct BeginBody {
    pub id: ItemId,
}

#[derive(serde::Deserialize)]
pub struct DraftBody {
    pub draft: String,
}

/// GET /api/edit — current edit session.
pub async fn get_edit(State(app): State<AppState>) -> Json<EditState> {
    Json(app.client.edit_state().await)
}

/// POST /api/edit/begin — start editing a record, displacing any other draft.
pub async fn begin_edit(
    State(app): State<AppState>,
    Json(body): Json<BeginBody>,
) -> Result<Json<EditState>, AppError> {
    Ok(Json(app.client.begin_edit(body.id).await?))
}

/// PUT /api/edit/draft — replace the draft text.
pub async fn change_draft(
    State(app): State<AppState>,
    Json(body): Json<DraftBody>,
) -> Result<Json<EditState>, AppError> {
    Ok(Json(app.client.change_draft(&body.draft).await?))
}

/// POST /api/edit/commit — submit the draft as a rename. The session ends
/// either way.
pub async fn commit_edit(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let committed = app.client.commit_edit().await?;
    Ok(Json(serde_json::json!({ "committed": committed })))
}

/// POST /api/edit/cancel — discard the draft.
pub async fn cancel_edit(State(app): State<AppState>) -> Json<EditState> {
    Json(app.client.cancel_edit().await)
}
