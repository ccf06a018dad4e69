use crate::types::ItemId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("work item not found: {0}")]
    NotFound(ItemId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("change feed error: {0}")]
    Subscription(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Transport-level failures that a later attempt may get past.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Subscription(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_network_failures_only() {
        assert!(SyncError::Transport("timeout".into()).is_retryable());
        assert!(SyncError::Subscription("closed".into()).is_retryable());
        assert!(!SyncError::Validation("empty title".into()).is_retryable());
        assert!(!SyncError::NotFound(ItemId(4)).is_retryable());
    }

    #[test]
    fn not_found_names_the_id() {
        let msg = SyncError::NotFound(ItemId(17)).to_string();
        assert_eq!(msg, "work item not found: 17");
    }
}
