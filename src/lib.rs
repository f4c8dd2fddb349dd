//! taskgraph - hierarchical task tracking with milestones and dependency
//! planning
//!
//! Tasks live in a [`TaskStore`] as a parent/child forest. Milestones group
//! tasks by content patterns ("Phase 2", "v1.3.0") and derive their status
//! from their members. A [`DependencyGraph`] built from the tasks' declared
//! dependencies yields levels, cycles, the critical path and an execution
//! plan.

pub mod domain;
pub mod storage;
pub mod store;
pub mod cli;

pub use domain::{
    DependencyGraph, Milestone, MilestoneDetector, MilestoneId, NewTask, Task, TaskId, TaskStatus,
};
pub use store::{StoreError, TaskEvent, TaskStore};
