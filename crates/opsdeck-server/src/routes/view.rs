use axum::extract::{Query, State};
use axum::Json;
use opsdeck_core::{Actor, DashboardView, OwnerFilter, ViewProjector};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, serde::Deserialize)]
pub struct ViewQuery {
    pub owner: Option<String>,
    #[serde(default)]
    pub show_completed: bool,
}

/// GET /api/view — per-owner lanes and status panels derived from the
/// latest snapshot.
pub async fn get_view(
    State(app): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<DashboardView>, AppError> {
    let filter = match query.owner.as_deref() {
        None | Some("") => OwnerFilter::All,
        Some(owner) => OwnerFilter::Only(owner.parse::<Actor>()?),
    };
    let projector = ViewProjector::new(query.show_completed);
    Ok(Json(projector.project(&app.client.snapshot(), filter)))
}
