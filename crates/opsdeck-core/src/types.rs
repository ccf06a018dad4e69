use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// ItemId
// ---------------------------------------------------------------------------

/// Primary key of a work item, assigned by the remote store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(ItemId)
            .map_err(|_| SyncError::Validation(format!("invalid item id '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Actor {
    /// The human operator.
    #[serde(rename = "Z")]
    Operator,
    /// The automated agent.
    #[serde(rename = "JARVIS")]
    Agent,
}

impl Actor {
    pub const ALL: [Actor; 2] = [Actor::Operator, Actor::Agent];

    pub fn as_str(self) -> &'static str {
        match self {
            Actor::Operator => "Z",
            Actor::Agent => "JARVIS",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Actor {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "z" | "operator" => Ok(Actor::Operator),
            "jarvis" | "agent" => Ok(Actor::Agent),
            _ => Err(SyncError::Validation(format!("unknown actor '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// ItemStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    InProgress,
    Done,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Done => "done",
        }
    }

    pub fn is_done(self) -> bool {
        matches!(self, ItemStatus::Done)
    }

    /// Completion toggle: `done` goes back to `pending`, anything else becomes
    /// `done`. `in_progress` is never restored.
    pub fn toggled(self) -> ItemStatus {
        match self {
            ItemStatus::Done => ItemStatus::Pending,
            ItemStatus::Pending | ItemStatus::InProgress => ItemStatus::Done,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Table / change notifications
// ---------------------------------------------------------------------------

/// Remote tables the dashboard mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tasks,
    Statuses,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Tasks, Table::Statuses];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::Statuses => "statuses",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Table {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tasks" => Ok(Table::Tasks),
            "statuses" => Ok(Table::Statuses),
            _ => Err(SyncError::Config(format!("unknown table '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a subscription wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventMask {
    pub const ALL: EventMask = EventMask {
        insert: true,
        update: true,
        delete: true,
    };

    pub fn contains(self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.insert,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
        }
    }
}

impl Default for EventMask {
    fn default() -> Self {
        EventMask::ALL
    }
}

/// "Something changed in this table." Carries no row data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    pub title: String,
    #[serde(rename = "assignee")]
    pub owner: Actor,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload; the remote assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkItem {
    pub title: String,
    #[serde(rename = "assignee")]
    pub owner: Actor,
    pub status: ItemStatus,
}

/// Partial update of a work item. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

impl ItemPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            status: None,
        }
    }

    pub fn status(status: ItemStatus) -> Self {
        Self {
            title: None,
            status: Some(status),
        }
    }

    pub fn apply(&self, item: &mut WorkItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(status) = self.status {
            item.status = status;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStatus {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "user_id")]
    pub actor: Actor,
    pub status_text: String,
    pub is_online: bool,
    pub updated_at: DateTime<Utc>,
}

impl ActorStatus {
    /// Stand-in used when the remote holds no status row for `actor`.
    pub fn fallback(actor: Actor) -> Self {
        let (text, online) = match actor {
            Actor::Operator => ("OFFLINE", false),
            Actor::Agent => ("STANDBY", true),
        };
        Self {
            id: 0,
            actor,
            status_text: text.to_string(),
            is_online: online,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Upsert payload for the per-actor status row, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpsert {
    #[serde(rename = "user_id")]
    pub actor: Actor,
    pub status_text: String,
    pub is_online: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
