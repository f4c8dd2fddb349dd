//! Task domain model
//!
//! Tasks are the tracked units of work. They form a hierarchy through
//! `children` (the owning edge) and `parent_id` (its back-reference), and
//! declare free-text ordering constraints in `metadata.dependencies`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::id::{MilestoneId, TaskId};

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
    Failed,
}

impl TaskStatus {
    /// All statuses, in display order
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Blocked,
        TaskStatus::Failed,
    ];

    /// Returns true if this status represents completion
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Returns true if this task is not yet started
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    /// Returns true if this task is currently being worked on
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pending" | "todo" => Ok(TaskStatus::Pending),
            "in_progress" | "active" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            "blocked" => Ok(TaskStatus::Blocked),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}

/// Priority of a task or milestone
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// High and critical priorities count as elevated
    pub fn is_elevated(&self) -> bool {
        *self >= Priority::High
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// Timestamps and scheduling metadata for a task
///
/// Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// IDs this task depends on. Free text: they may point at tasks that
    /// were never added.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TaskMetadata {
    /// Creates metadata stamped with the given creation time
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            estimated_duration: None,
            actual_duration: None,
            tags: Vec::new(),
            dependencies: Vec::new(),
            notes: None,
        }
    }
}

/// A tracked task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, assigned by the store
    pub id: TaskId,

    /// Imperative description ("Run the migrations")
    pub content: String,

    /// Present-progressive description shown while in progress
    /// ("Running the migrations")
    pub active_form: String,

    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,

    /// Milestone membership back-reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<MilestoneId>,

    pub metadata: TaskMetadata,

    /// Owned child IDs, in order
    #[serde(default)]
    pub children: Vec<TaskId>,
}

impl Task {
    /// Creates a new pending task with the given ID and descriptions
    pub fn new(id: TaskId, content: impl Into<String>, active_form: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            active_form: active_form.into(),
            status: TaskStatus::Pending,
            priority: None,
            parent_id: None,
            milestone_id: None,
            metadata: TaskMetadata::new(Utc::now()),
            children: Vec::new(),
        }
    }

    /// Returns true if the task has no parent
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns the description to show for the task's current status
    pub fn display_text(&self) -> &str {
        if self.status.is_active() && !self.active_form.is_empty() {
            &self.active_form
        } else {
            &self.content
        }
    }

    /// Moves the task to `status`, returning the previous status.
    ///
    /// The first move into `InProgress` stamps `started_at`. The first move
    /// into `Completed` stamps `completed_at` and derives `actual_duration`
    /// from `started_at` when the task was started.
    pub fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>) -> TaskStatus {
        let old = self.status;
        self.status = status;
        self.metadata.updated_at = now;

        match status {
            TaskStatus::InProgress if self.metadata.started_at.is_none() => {
                self.metadata.started_at = Some(now);
            }
            TaskStatus::Completed if self.metadata.completed_at.is_none() => {
                self.metadata.completed_at = Some(now);
                self.metadata.actual_duration = self
                    .metadata
                    .started_at
                    .map(|started| (now - started).num_milliseconds());
            }
            _ => {}
        }

        old
    }

    /// Adds a dependency, ignoring duplicates and self-references
    pub fn add_dependency(&mut self, task_id: TaskId) -> bool {
        if task_id == self.id || self.metadata.dependencies.contains(&task_id) {
            return false;
        }
        self.metadata.dependencies.push(task_id);
        true
    }

    /// Adds a tag, ignoring duplicates
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.metadata.tags.contains(&tag) {
            return false;
        }
        self.metadata.tags.push(tag);
        true
    }

    /// Returns true if the task carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }

    /// Marks the task as touched
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.updated_at = now;
    }
}

/// Input for adding a task to the store
///
/// Also the entry shape accepted by bulk import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub content: String,

    #[serde(default)]
    pub active_form: String,

    #[serde(default)]
    pub status: Option<TaskStatus>,

    #[serde(default)]
    pub priority: Option<Priority>,

    #[serde(default)]
    pub parent_id: Option<TaskId>,

    #[serde(default)]
    pub milestone_id: Option<MilestoneId>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<TaskId>,

    #[serde(default)]
    pub estimated_duration: Option<i64>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl NewTask {
    pub fn new(content: impl Into<String>, active_form: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            active_form: active_form.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn parent(mut self, parent_id: TaskId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn milestone(mut self, milestone_id: MilestoneId) -> Self {
        self.milestone_id = Some(milestone_id);
        self
    }

    pub fn depends_on(mut self, task_id: TaskId) -> Self {
        self.dependencies.push(task_id);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn estimated_duration(mut self, millis: i64) -> Self {
        self.estimated_duration = Some(millis);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Materializes the input into a task with the given ID and timestamp
    pub fn into_task(self, id: TaskId, now: DateTime<Utc>) -> Task {
        let mut metadata = TaskMetadata::new(now);
        metadata.estimated_duration = self.estimated_duration;
        metadata.notes = self.notes;

        let mut task = Task {
            id,
            content: self.content,
            active_form: self.active_form,
            status: TaskStatus::Pending,
            priority: self.priority,
            parent_id: self.parent_id,
            milestone_id: self.milestone_id,
            metadata,
            children: Vec::new(),
        };

        for tag in self.tags {
            task.add_tag(tag);
        }
        for dep in self.dependencies {
            task.add_dependency(dep);
        }

        if let Some(status) = self.status {
            if status != TaskStatus::Pending {
                task.transition(status, now);
            }
        }

        task
    }
}
