use serde::{Deserialize, Serialize};

use crate::store::Snapshot;
use crate::types::{Actor, ActorStatus, WorkItem};

/// Which owners' lanes to derive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerFilter {
    #[default]
    All,
    Only(Actor),
}

impl OwnerFilter {
    pub fn admits(self, actor: Actor) -> bool {
        match self {
            OwnerFilter::All => true,
            OwnerFilter::Only(only) => only == actor,
        }
    }
}

impl From<Option<Actor>> for OwnerFilter {
    fn from(actor: Option<Actor>) -> Self {
        actor.map_or(OwnerFilter::All, OwnerFilter::Only)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorPanel {
    pub actor: Actor,
    pub status: ActorStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lane {
    pub owner: Actor,
    /// Items not yet done, whether or not they are shown.
    pub active: usize,
    pub items: Vec<WorkItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    pub revision: u64,
    pub panels: Vec<ActorPanel>,
    pub lanes: Vec<Lane>,
}

/// Derives per-owner lanes from a snapshot. The only state it carries is
/// whether completed items are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewProjector {
    pub show_completed: bool,
}

impl ViewProjector {
    pub fn new(show_completed: bool) -> Self {
        Self { show_completed }
    }

    pub fn toggle_show_completed(&mut self) -> bool {
        self.show_completed = !self.show_completed;
        self.show_completed
    }

    pub fn project(&self, snapshot: &Snapshot, filter: OwnerFilter) -> DashboardView {
        let panels = Actor::ALL
            .iter()
            .map(|&actor| ActorPanel {
                actor,
                status: snapshot.status_for(actor),
            })
            .collect();

        let lanes = Actor::ALL
            .iter()
            .copied()
            .filter(|&owner| filter.admits(owner))
            .map(|owner| Lane {
                owner,
                active: snapshot
                    .items_for(owner)
                    .filter(|i| !i.status.is_done())
                    .count(),
                items: snapshot
                    .items_for(owner)
                    .filter(|i| self.show_completed || !i.status.is_done())
                    .cloned()
                    .collect(),
            })
            .collect();

        DashboardView {
            revision: snapshot.revision,
            panels,
            lanes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemId, ItemStatus};
    use chrono::{TimeZone, Utc};

    fn item(id: i64, owner: Actor, status: ItemStatus) -> WorkItem {
        WorkItem {
            id: ItemId(id),
            title: format!("item {id}"),
            owner,
            status,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, id as u32).unwrap(),
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            revision: 7,
            items: vec![
                item(4, Actor::Agent, ItemStatus::InProgress),
                item(3, Actor::Operator, ItemStatus::Done),
                item(2, Actor::Operator, ItemStatus::Pending),
                item(1, Actor::Agent, ItemStatus::Done),
            ],
            statuses: vec![],
            refreshed_at: None,
        }
    }

    fn ids(lane: &Lane) -> Vec<i64> {
        lane.items.iter().map(|i| i.id.0).collect()
    }

    #[test]
    fn hides_done_items_by_default() {
        let view = ViewProjector::default().project(&snapshot(), OwnerFilter::All);
        assert_eq!(view.lanes.len(), 2);
        assert_eq!(view.lanes[0].owner, Actor::Operator);
        assert_eq!(ids(&view.lanes[0]), vec![2]);
        assert_eq!(ids(&view.lanes[1]), vec![4]);
    }

    #[test]
    fn show_completed_keeps_order() {
        let view = ViewProjector::new(true).project(&snapshot(), OwnerFilter::All);
        assert_eq!(ids(&view.lanes[0]), vec![3, 2]);
        assert_eq!(ids(&view.lanes[1]), vec![4, 1]);
    }

    #[test]
    fn active_counts_ignore_visibility_flag() {
        let snap = snapshot();
        for projector in [ViewProjector::new(false), ViewProjector::new(true)] {
            let view = projector.project(&snap, OwnerFilter::All);
            assert_eq!(view.lanes[0].active, 1);
            assert_eq!(view.lanes[1].active, 1);
        }
    }

    #[test]
    fn owner_filter_limits_lanes_but_not_panels() {
        let view = ViewProjector::default().project(&snapshot(), OwnerFilter::Only(Actor::Agent));
        assert_eq!(view.lanes.len(), 1);
        assert_eq!(view.lanes[0].owner, Actor::Agent);
        assert_eq!(view.panels.len(), 2);
    }

    #[test]
    fn missing_status_rows_fall_back() {
        let view = ViewProjector::default().project(&snapshot(), OwnerFilter::All);
        assert_eq!(view.panels[0].status.status_text, "OFFLINE");
        assert_eq!(view.panels[1].status.status_text, "STANDBY");
    }

    #[test]
    fn projection_is_repeatable() {
        let snap = snapshot();
        let mut projector = ViewProjector::default();
        for _ in 0..2 {
            let first = projector.project(&snap, OwnerFilter::All);
            let second = projector.project(&snap, OwnerFilter::All);
            assert_eq!(first, second);
            projector.toggle_show_completed();
        }
    }
}
