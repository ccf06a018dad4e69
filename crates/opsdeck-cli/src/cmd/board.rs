use crate::output::{print_json, print_table};
use anyhow::Context;
use opsdeck_core::{Actor, DashboardView, OwnerFilter, SyncClient, ViewProjector};
use std::path::Path;

pub fn snapshot(
    config_path: &Path,
    show_completed: bool,
    owner: Option<Actor>,
    json: bool,
) -> anyhow::Result<()> {
    let rt = super::runtime()?;
    rt.block_on(async {
        let client = super::mount_once(config_path).await?;
        let view = ViewProjector::new(show_completed).project(&client.snapshot(), owner.into());
        let failure = client.store().last_error();
        client.teardown().await;

        if let Some(err) = failure {
            anyhow::bail!("could not read remote store: {err}");
        }
        render(&view, json)
    })
}

pub fn watch(
    config_path: &Path,
    show_completed: bool,
    owner: Option<Actor>,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let projector = ViewProjector::new(show_completed);
    let filter = OwnerFilter::from(owner);
    let rt = super::runtime()?;

    rt.block_on(async move {
        let client = SyncClient::mount_from_config(&config)
            .await
            .context("failed to connect to remote store")?;
        let mut updates = client.store().subscribe();

        let result = loop {
            let snapshot = updates.borrow_and_update().clone();
            if let Err(e) = render(&projector.project(&snapshot, filter), json) {
                break Err(e);
            }
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                }
                _ = tokio::signal::ctrl_c() => break Ok(()),
            }
        };

        client.teardown().await;
        result
    })
}

fn render(view: &DashboardView, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(view);
    }

    for panel in &view.panels {
        let presence = if panel.status.is_online {
            "online"
        } else {
            "offline"
        };
        println!(
            "{:<7} {} ({presence})",
            panel.actor.as_str(),
            panel.status.status_text
        );
    }

    for lane in &view.lanes {
        println!();
        println!("{} ({} active)", lane.owner, lane.active);
        if lane.items.is_empty() {
            println!("  (no items)");
            continue;
        }
        let rows = lane
            .items
            .iter()
            .map(|item| {
                vec![
                    item.id.to_string(),
                    item.status.to_string(),
                    item.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    item.title.clone(),
                ]
            })
            .collect();
        print_table(&["ID", "STATUS", "CREATED", "TITLE"], rows);
    }
    Ok(())
}
