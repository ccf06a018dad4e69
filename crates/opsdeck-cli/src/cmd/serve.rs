use anyhow::Context;
use opsdeck_core::SyncClient;
use std::path::Path;
use std::sync::Arc;

pub fn run(config_path: &Path, port: u16) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let rt = super::runtime()?;

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;

        let client = Arc::new(
            SyncClient::mount_from_config(&config)
                .await
                .context("failed to connect to remote store")?,
        );
        let served = opsdeck_server::serve_on(Arc::clone(&client), listener).await;

        match Arc::try_unwrap(client) {
            Ok(client) => client.teardown().await,
            Err(_) => tracing::debug!("client still shared at shutdown; dropping"),
        }
        served
    })
}
