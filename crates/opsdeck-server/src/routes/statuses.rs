use axum::extract::{Path, State};
use axum::Json;
use opsdeck_core::{Actor, ActorStatus};

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct StatusBody {
    pub status_text: String,
    #[serde(default = "online")]
    pub is_online: bool,
}

fn online() -> bool {
    true
}

/// PUT /api/statuses/:actor — publish an actor's presence line.
pub async fn put_status(
    State(app): State<AppState>,
    Path(actor): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ActorStatus>, AppError> {
    let actor: Actor = actor.parse()?;
    let status = app
        .client
        .gateway()
        .upsert_status(actor, &body.status_text, body.is_online)
        .await?;
    Ok(Json(status))
}
