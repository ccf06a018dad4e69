//! Synchronization core for the opsdeck dashboard.
//!
//! A [`SyncedStore`] holds the latest consistent [`Snapshot`] of the shared
//! work-item and actor-status tables. A [`ChangeFeedSubscriber`] listens for
//! row changes on the remote and schedules refreshes; the
//! [`MutationGateway`] writes through to the remote and reconciles the cache
//! afterwards. [`SyncClient`] wires all of it together with the single
//! [`EditSession`] a dashboard owns.

pub mod backoff;
pub mod client;
pub mod config;
pub mod edit;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod memory;
pub mod remote;
pub mod rest;
pub mod store;
pub mod types;
pub mod view;

pub use client::{connect_remote, SyncClient};
pub use config::SyncConfig;
pub use edit::{EditSession, EditState};
pub use error::{Result, SyncError};
pub use feed::{ChangeFeedSubscriber, FeedHealth};
pub use gateway::MutationGateway;
pub use memory::MemoryRemote;
pub use remote::RemoteStore;
pub use store::{Snapshot, SyncedStore};
pub use types::{Actor, ActorStatus, ItemId, ItemStatus, Table, WorkItem};
pub use view::{DashboardView, OwnerFilter, ViewProjector};
