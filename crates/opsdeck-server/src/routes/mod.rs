pub mod edit;
pub mod events;
pub mod items;
pub mod snapshot;
pub mod statuses;
pub mod view;
