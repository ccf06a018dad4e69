use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opsdeck_core::SyncError;

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// 400 Bad Request with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(SyncError::Validation(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<SyncError>() {
            Some(SyncError::Validation(_)) => StatusCode::BAD_REQUEST,
            Some(SyncError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(SyncError::Transport(_) | SyncError::Subscription(_)) => StatusCode::BAD_GATEWAY,
            Some(
                SyncError::Config(_) | SyncError::Io(_) | SyncError::Yaml(_) | SyncError::Json(_),
            )
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::warn!(error = %self.0, %status, "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
