//! Progress statistics

use serde::{Deserialize, Serialize};

use super::task::{Task, TaskStatus};

/// Task counts by status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub blocked: usize,
    pub failed: usize,
    /// `completed / total`, 0 when there are no tasks
    pub completion_rate: f64,
}

impl ProgressStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = Self::default();

        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Blocked => stats.blocked += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }

        if stats.total > 0 {
            stats.completion_rate = stats.completed as f64 / stats.total as f64;
        }

        stats
    }

    /// Returns the count for a single status
    pub fn count(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Completed => self.completed,
            TaskStatus::Blocked => self.blocked,
            TaskStatus::Failed => self.failed,
        }
    }
}
