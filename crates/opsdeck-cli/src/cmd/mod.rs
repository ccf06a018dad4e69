pub mod board;
pub mod config;
pub mod item;
pub mod serve;
pub mod status;

use anyhow::Context;
use opsdeck_core::{SyncClient, SyncConfig};
use std::path::Path;

pub(crate) fn load_config(path: &Path) -> anyhow::Result<SyncConfig> {
    let config = SyncConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    if config.has_errors() {
        anyhow::bail!(
            "config {} has errors; run `opsdeck config check`",
            path.display()
        );
    }
    Ok(config)
}

/// Mount a client for one request/response command. The change feed is not
/// opened; the command reads the snapshot its own writes refresh.
pub(crate) async fn mount_once(path: &Path) -> anyhow::Result<SyncClient> {
    let mut config = load_config(path)?;
    config.feed.tables.clear();
    SyncClient::mount_from_config(&config)
        .await
        .context("failed to connect to remote store")
}

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}
