//! # Task Store
//!
//! The authoritative, mutable owner of tasks and milestones.
//!
//! ## Mutation Contract
//!
//! Every mutating call either fails before touching state, or:
//!
//! 1. applies the change and refreshes milestone statuses
//! 2. writes a snapshot (when persistence is enabled)
//! 3. delivers events to listeners, in order
//!
//! Errors from steps 2 and 3 are returned after the change is applied. A
//! persistence error is reported before a listener error.
//!
//! ## Key Types
//!
//! - [`TaskStore`] - Task and milestone registry
//! - [`TaskEvent`] - Change notifications
//! - [`StoreError`] - Everything a store call can fail with

mod error;
mod events;
mod task_store;

pub use error::StoreError;
pub use events::{EventBus, EventKind, Listener, SubscriptionId, TaskEvent};
pub use task_store::TaskStore;
