//! Task store errors

use thiserror::Error;

use crate::domain::{MilestoneId, TaskId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown {kind}: {id}")]
    InvalidReference { kind: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Setting parent {parent} on {task} would make the task its own ancestor")]
    CircularDependency { task: TaskId, parent: TaskId },

    #[error("Milestone not found: {0}")]
    MilestoneNotFound(MilestoneId),

    #[error("Persistence failed: {0:#}")]
    Persistence(anyhow::Error),

    #[error("Event listener failed: {0:#}")]
    Listener(anyhow::Error),
}

impl StoreError {
    pub(crate) fn unknown_task(id: &TaskId) -> Self {
        StoreError::InvalidReference {
            kind: "task",
            id: id.to_string(),
        }
    }

    pub(crate) fn unknown_parent(id: &TaskId) -> Self {
        StoreError::InvalidReference {
            kind: "parent task",
            id: id.to_string(),
        }
    }

    pub(crate) fn unknown_milestone(id: &MilestoneId) -> Self {
        StoreError::InvalidReference {
            kind: "milestone",
            id: id.to_string(),
        }
    }
}
