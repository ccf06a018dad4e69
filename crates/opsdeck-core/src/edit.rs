use serde::Serialize;

use crate::store::Snapshot;
use crate::types::{ItemId, WorkItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EditState {
    Idle,
    Editing { id: ItemId, draft: String },
}

/// Exclusive rename session: at most one record is being edited at a time.
///
/// Beginning an edit on another record drops the current draft. Committing
/// ends the session and hands the draft to the caller, which submits the
/// rename (see `SyncClient::commit_edit`).
#[derive(Debug, Clone)]
pub struct EditSession {
    state: EditState,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self {
            state: EditState::Idle,
        }
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn editing(&self) -> Option<ItemId> {
        match &self.state {
            EditState::Editing { id, .. } => Some(*id),
            EditState::Idle => None,
        }
    }

    pub fn is_editing(&self, id: ItemId) -> bool {
        self.editing() == Some(id)
    }

    /// Start editing `item`, seeding the draft with its current title.
    /// Returns the record whose draft was discarded, if any.
    pub fn begin(&mut self, item: &WorkItem) -> Option<ItemId> {
        let displaced = self.editing().filter(|prev| *prev != item.id);
        if let Some(prev) = displaced {
            tracing::debug!(%prev, next = %item.id, "edit displaced");
        }
        self.state = EditState::Editing {
            id: item.id,
            draft: item.title.clone(),
        };
        displaced
    }

    /// Replace the draft. Ignored (returns `false`) when nothing is being edited.
    pub fn change_draft(&mut self, draft: impl Into<String>) -> bool {
        match &mut self.state {
            EditState::Editing { draft: current, .. } => {
                *current = draft.into();
                true
            }
            EditState::Idle => false,
        }
    }

    pub fn cancel(&mut self) {
        self.state = EditState::Idle;
    }

    /// End the session and hand back what should be submitted.
    pub fn take_commit(&mut self) -> Option<(ItemId, String)> {
        match std::mem::replace(&mut self.state, EditState::Idle) {
            EditState::Editing { id, draft } => Some((id, draft)),
            EditState::Idle => None,
        }
    }

    /// Drop the session if its record disappeared from `snapshot`.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> bool {
        match self.editing() {
            Some(id) if snapshot.item(id).is_none() => {
                tracing::debug!(%id, "edited record removed; ending edit");
                self.state = EditState::Idle;
                true
            }
            _ => false,
        }
    }
}
