//! Domain models for taskgraph
//!
//! Contains the core business logic without any I/O concerns.

mod id;
mod task;
mod milestone;
mod graph;
mod stats;

pub use id::{IdError, MilestoneId, TaskId};
pub use task::{NewTask, Priority, Task, TaskMetadata, TaskStatus};
pub use milestone::{
    calculate_milestone_status, default_rules, suggest_groupings, DetectorConfig,
    GroupingSuggestion, Milestone, MilestoneDetector, MilestoneRule, MilestoneType, RuleError,
};
pub use graph::{CycleReport, DependencyGraph, DependencyNode};
pub use stats::ProgressStats;
