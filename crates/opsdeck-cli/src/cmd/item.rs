use crate::output::print_json;
use opsdeck_core::{Actor, ItemId};
use std::path::Path;

pub fn add(config_path: &Path, owner: Actor, title: &str, json: bool) -> anyhow::Result<()> {
    let rt = super::runtime()?;
    rt.block_on(async {
        let client = super::mount_once(config_path).await?;
        let created = client.gateway().create(title, owner).await;
        client.teardown().await;
        let item = created?;

        if json {
            print_json(&item)?;
        } else {
            println!("Created #{} for {}: {}", item.id, item.owner, item.title);
        }
        Ok(())
    })
}

pub fn toggle(config_path: &Path, id: ItemId, json: bool) -> anyhow::Result<()> {
    let rt = super::runtime()?;
    rt.block_on(async {
        let client = super::mount_once(config_path).await?;
        let toggled = client.gateway().toggle(id).await;
        client.teardown().await;
        let status = toggled?;

        if json {
            print_json(&serde_json::json!({ "id": id, "status": status }))?;
        } else {
            println!("#{id} is now {status}");
        }
        Ok(())
    })
}

pub fn rename(config_path: &Path, id: ItemId, title: &str, json: bool) -> anyhow::Result<()> {
    let rt = super::runtime()?;
    rt.block_on(async {
        let client = super::mount_once(config_path).await?;
        let renamed = client.gateway().rename(id, title).await;
        client.teardown().await;
        renamed?;

        if json {
            print_json(&serde_json::json!({ "id": id, "title": title }))?;
        } else {
            println!("Renamed #{id}: {title}");
        }
        Ok(())
    })
}

pub fn delete(config_path: &Path, id: ItemId, json: bool) -> anyhow::Result<()> {
    let rt = super::runtime()?;
    rt.block_on(async {
        let client = super::mount_once(config_path).await?;
        let deleted = client.gateway().delete(id).await;
        client.teardown().await;
        deleted?;

        if json {
            print_json(&serde_json::json!({ "id": id, "deleted": true }))?;
        } else {
            println!("Deleted #{id}");
        }
        Ok(())
    })
}
