//! Task CLI commands

use anyhow::Result;
use clap::Subcommand;
use tracing::debug;

use super::output::Output;
use crate::domain::{MilestoneId, NewTask, Priority, Task, TaskId, TaskStatus};
use crate::storage::Project;
use crate::store::TaskStore;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    ///
    /// Examples:
    ///   taskgraph task add "Phase 1: Setup"
    ///   taskgraph task add "Write schema" --parent t-1a2b3c4 --priority high
    Add {
        /// Imperative description
        content: String,

        /// Description shown while the task is in progress
        #[arg(long)]
        active_form: Option<String>,

        /// Parent task ID
        #[arg(long)]
        parent: Option<TaskId>,

        /// Priority (low, medium, high, critical)
        #[arg(long, short)]
        priority: Option<Priority>,

        /// Milestone ID (`rule:token`)
        #[arg(long)]
        milestone: Option<MilestoneId>,

        /// Tag (repeatable)
        #[arg(long = "tag", short)]
        tags: Vec<String>,

        /// Task this one depends on (repeatable)
        #[arg(long = "depends-on", short)]
        depends_on: Vec<TaskId>,

        /// Estimate in minutes
        #[arg(long)]
        estimate: Option<u32>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List tasks as a tree
    List {
        /// Only tasks with this status (flat list)
        #[arg(long)]
        status: Option<TaskStatus>,

        /// Only tasks with this tag (flat list)
        #[arg(long)]
        tag: Option<String>,
    },

    /// Show task details
    Show {
        /// Task ID
        id: TaskId,
    },

    /// Mark task as in progress
    Start {
        /// Task ID
        id: TaskId,
    },

    /// Mark task as completed
    Done {
        /// Task ID
        id: TaskId,
    },

    /// Mark task as blocked
    Block {
        /// Task ID
        id: TaskId,
    },

    /// Mark task as failed
    Fail {
        /// Task ID
        id: TaskId,
    },

    /// Move task back to pending
    Reset {
        /// Task ID
        id: TaskId,
    },

    /// Edit task fields
    Edit {
        /// Task ID
        id: TaskId,

        /// New imperative description
        #[arg(long)]
        content: Option<String>,

        /// New in-progress description
        #[arg(long)]
        active_form: Option<String>,

        /// New priority
        #[arg(long, short)]
        priority: Option<Priority>,

        /// Tag to add (repeatable)
        #[arg(long = "tag", short)]
        tags: Vec<String>,

        /// New notes
        #[arg(long)]
        notes: Option<String>,

        /// New estimate in minutes
        #[arg(long)]
        estimate: Option<u32>,
    },

    /// Add a dependency between tasks
    Dep {
        /// Task that waits
        task: TaskId,

        /// Task that must be completed first
        depends_on: TaskId,
    },

    /// Move a task under another parent
    Move {
        /// Task ID
        id: TaskId,

        /// New parent (omit to make the task a root)
        #[arg(long)]
        parent: Option<TaskId>,
    },

    /// Put a task in a milestone
    Assign {
        /// Task ID
        id: TaskId,

        /// Milestone ID (omit to clear)
        milestone: Option<MilestoneId>,
    },

    /// Remove a task
    Remove {
        /// Task ID
        id: TaskId,

        /// Remove descendants too (otherwise children move up a level)
        #[arg(long)]
        cascade: bool,
    },
}

pub fn run(cmd: TaskCommands, output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store()?;

    match cmd {
        TaskCommands::Add {
            content,
            active_form,
            parent,
            priority,
            milestone,
            tags,
            depends_on,
            estimate,
            notes,
        } => {
            let mut new = NewTask::new(content, active_form.unwrap_or_default());
            new.parent_id = parent;
            new.priority = priority;
            new.milestone_id = milestone;
            new.tags = tags;
            new.dependencies = depends_on;
            new.estimated_duration = estimate.map(minutes_to_millis);
            new.notes = notes;
            add_task(&mut store, output, new)
        }
        TaskCommands::List { status, tag } => list_tasks(&store, output, status, tag.as_deref()),
        TaskCommands::Show { id } => show_task(&store, output, &id),
        TaskCommands::Start { id } => set_status(&mut store, output, &id, TaskStatus::InProgress),
        TaskCommands::Done { id } => set_status(&mut store, output, &id, TaskStatus::Completed),
        TaskCommands::Block { id } => set_status(&mut store, output, &id, TaskStatus::Blocked),
        TaskCommands::Fail { id } => set_status(&mut store, output, &id, TaskStatus::Failed),
        TaskCommands::Reset { id } => set_status(&mut store, output, &id, TaskStatus::Pending),
        TaskCommands::Edit {
            id,
            content,
            active_form,
            priority,
            tags,
            notes,
            estimate,
        } => {
            if let Some(content) = content {
                store.update_task_content(&id, content, active_form)?;
            } else if let Some(active_form) = active_form {
                let content = current(&store, &id)?.content.clone();
                store.update_task_content(&id, content, Some(active_form))?;
            }
            if priority.is_some() {
                store.set_priority(&id, priority)?;
            }
            if !tags.is_empty() {
                store.add_tags(&id, tags)?;
            }
            if notes.is_some() {
                store.set_notes(&id, notes)?;
            }
            if let Some(minutes) = estimate {
                store.set_estimated_duration(&id, Some(minutes_to_millis(minutes)))?;
            }
            report_task(output, current(&store, &id)?, "Updated task")
        }
        TaskCommands::Dep { task, depends_on } => {
            if !store.contains(&depends_on) {
                anyhow::bail!("Dependency task not found: {}", depends_on);
            }
            store.add_dependency(&task, depends_on.clone())?;

            let graph = store.dependency_graph();
            if graph.cycle().detected {
                let path: Vec<&str> = graph.cycle().path.iter().map(TaskId::as_str).collect();
                eprintln!("Warning: dependency cycle: {}", path.join(" -> "));
            }

            if output.is_json() {
                output.data(&serde_json::json!({
                    "task": task,
                    "dependsOn": depends_on,
                }));
            } else {
                output.success(&format!("{} now depends on {}", task, depends_on));
            }
            Ok(())
        }
        TaskCommands::Move { id, parent } => {
            store.move_task(&id, parent)?;
            report_task(output, current(&store, &id)?, "Moved task")
        }
        TaskCommands::Assign { id, milestone } => {
            store.assign_to_milestone(&id, milestone)?;
            report_task(output, current(&store, &id)?, "Assigned task")
        }
        TaskCommands::Remove { id, cascade } => {
            let before = store.len();
            store.remove_task(&id, cascade)?;
            let removed = before - store.len();

            if output.is_json() {
                output.data(&serde_json::json!({ "id": id, "removed": removed }));
            } else {
                output.success(&format!("Removed {} task(s)", removed));
            }
            Ok(())
        }
    }
}

fn minutes_to_millis(minutes: u32) -> i64 {
    i64::from(minutes) * 60_000
}

fn current<'a>(store: &'a TaskStore, id: &TaskId) -> Result<&'a Task> {
    store
        .get_task(id)
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))
}

fn report_task(output: &Output, task: &Task, verb: &str) -> Result<()> {
    if output.is_json() {
        output.data(task);
    } else {
        output.success(&format!("{}: {} - {}", verb, task.id, task.content));
    }
    Ok(())
}

fn add_task(store: &mut TaskStore, output: &Output, new: NewTask) -> Result<()> {
    let id = store.add_task(new)?;
    debug!(task_id = %id, "created task");

    let task = current(store, &id)?;
    if output.is_json() {
        output.data(task);
    } else {
        output.success(&format!("Created task: {} - {}", task.id, task.content));
    }

    Ok(())
}

fn set_status(store: &mut TaskStore, output: &Output, id: &TaskId, status: TaskStatus) -> Result<()> {
    store.update_task_status(id, status)?;
    let task = current(store, id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": task.id,
            "status": task.status,
            "completedAt": task.metadata.completed_at,
        }));
    } else {
        output.success(&format!("{} is now {}", task.id, task.status));
    }

    Ok(())
}

fn list_tasks(store: &TaskStore, output: &Output, status: Option<TaskStatus>, tag: Option<&str>) -> Result<()> {
    let filtered = status.is_some() || tag.is_some();
    let tasks: Vec<&Task> = store
        .get_all_tasks()
        .into_iter()
        .filter(|t| status.map_or(true, |s| t.status == s))
        .filter(|t| tag.map_or(true, |tag| t.has_tag(tag)))
        .collect();

    if output.is_json() {
        output.data(&tasks);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks");
        return Ok(());
    }

    println!("{:<10} {:<12} TASK", "ID", "STATUS");
    println!("{}", "-".repeat(60));

    if filtered {
        for task in tasks {
            print_row(task, 0);
        }
        return Ok(());
    }

    // Depth-first over the hierarchy, roots in store order
    let mut stack: Vec<(&Task, usize)> = store
        .get_root_tasks()
        .into_iter()
        .rev()
        .map(|t| (t, 0))
        .collect();
    while let Some((task, depth)) = stack.pop() {
        print_row(task, depth);
        stack.extend(
            store
                .get_children(&task.id)
                .into_iter()
                .rev()
                .map(|child| (child, depth + 1)),
        );
    }

    Ok(())
}

fn print_row(task: &Task, depth: usize) {
    println!(
        "{:<10} {:<12} {}{}",
        task.id,
        task.status,
        "  ".repeat(depth),
        task.display_text()
    );
}

fn show_task(store: &TaskStore, output: &Output, id: &TaskId) -> Result<()> {
    let task = current(store, id)?;
    let graph = store.dependency_graph();
    let node = graph.node(id);
    let is_ready = graph.ready_tasks().contains(id);
    let is_blocked = graph.blocked_tasks().contains(id);

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "level": node.map(|n| n.level),
            "dependents": node.map(|n| n.dependents.clone()).unwrap_or_default(),
            "isCriticalPath": node.is_some_and(|n| n.is_critical_path),
            "isReady": is_ready,
            "isBlocked": is_blocked,
        }));
        return Ok(());
    }

    println!("Task: {}", task.id);
    println!("Content: {}", task.content);
    if !task.active_form.is_empty() {
        println!("Active form: {}", task.active_form);
    }
    println!("Status: {}", task.status);
    if let Some(priority) = task.priority {
        println!("Priority: {}", priority.as_str());
    }
    if let Some(parent) = &task.parent_id {
        println!("Parent: {}", parent);
    }
    if let Some(milestone) = &task.milestone_id {
        println!("Milestone: {}", milestone);
    }

    let meta = &task.metadata;
    println!("Created: {}", meta.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated: {}", meta.updated_at.format("%Y-%m-%d %H:%M"));
    if let Some(started) = meta.started_at {
        println!("Started: {}", started.format("%Y-%m-%d %H:%M"));
    }
    if let Some(completed) = meta.completed_at {
        println!("Completed: {}", completed.format("%Y-%m-%d %H:%M"));
    }
    if let Some(estimate) = meta.estimated_duration {
        println!("Estimate: {} min", estimate / 60_000);
    }
    if let Some(actual) = meta.actual_duration {
        println!("Took: {} min", actual / 60_000);
    }
    if !meta.tags.is_empty() {
        println!("Tags: {}", meta.tags.join(", "));
    }

    if !task.children.is_empty() {
        println!("\nSubtasks:");
        for child in store.get_children(id) {
            println!("  {} ({}) {}", child.id, child.status, child.content);
        }
    }

    if !meta.dependencies.is_empty() {
        println!("\nDepends on:");
        for dep in &meta.dependencies {
            let dep_status = store
                .get_task(dep)
                .map(|t| t.status.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  {} ({})", dep, dep_status);
        }
    }

    if let Some(notes) = &meta.notes {
        println!("\nNotes:");
        println!("{}", notes);
    }

    println!();
    if is_ready {
        println!("READY (all dependencies complete)");
    } else if is_blocked {
        println!("BLOCKED (waiting on dependencies)");
    }

    Ok(())
}
