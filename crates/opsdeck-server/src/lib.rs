pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{delete, get, post, put};
use axum::Router;
use opsdeck_core::SyncClient;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(client: Arc<SyncClient>) -> Router {
    let app_state = state::AppState::new(client);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Snapshot
        .route("/api/snapshot", get(routes::snapshot::get_snapshot))
        .route("/api/refresh", post(routes::snapshot::refresh))
        .route("/api/view", get(routes::view::get_view))
        // Work items
        .route("/api/items", post(routes::items::create_item))
        .route("/api/items/{id}/toggle", post(routes::items::toggle_item))
        .route("/api/items/{id}/title", put(routes::items::rename_item))
        .route("/api/items/{id}", delete(routes::items::delete_item))
        // Actor statuses
        .route("/api/statuses/{actor}", put(routes::statuses::put_status))
        // Edit session
        .route("/api/edit", get(routes::edit::get_edit))
        .route("/api/edit/begin", post(routes::edit::begin_edit))
        .route("/api/edit/draft", put(routes::edit::change_draft))
        .route("/api/edit/commit", post(routes::edit::commit_edit))
        .route("/api/edit/cancel", post(routes::edit::cancel_edit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the dashboard API on `0.0.0.0:{port}`.
pub async fn serve(client: Arc<SyncClient>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(client, listener).await
}

/// Serve on a pre-bound listener, so the caller can read the actual port
/// first (useful with `port = 0`).
pub async fn serve_on(
    client: Arc<SyncClient>,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(client);

    tracing::info!("opsdeck server listening on http://localhost:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
