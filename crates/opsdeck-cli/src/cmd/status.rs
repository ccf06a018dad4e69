use crate::output::print_json;
use opsdeck_core::Actor;
use std::path::Path;

pub fn run(
    config_path: &Path,
    actor: Actor,
    text: &str,
    online: bool,
    json: bool,
) -> anyhow::Result<()> {
    let rt = super::runtime()?;
    rt.block_on(async {
        let client = super::mount_once(config_path).await?;
        let published = client.gateway().upsert_status(actor, text, online).await;
        client.teardown().await;
        let status = published?;

        if json {
            print_json(&status)?;
        } else {
            let presence = if status.is_online { "online" } else { "offline" };
            println!("{}: {} ({presence})", status.actor, status.status_text);
        }
        Ok(())
    })
}
