//! Query commands (stats, ready, blocked, graph, plan, milestones, suggest)

use anyhow::Result;
use tracing::debug;

use super::output::Output;
use crate::domain::{suggest_groupings, TaskId};
use crate::storage::Project;
use crate::store::TaskStore;

fn open() -> Result<TaskStore> {
    let project = Project::open_current()?;
    debug!(root = %project.root().display(), "opened project");
    project.open_store()
}

fn content_of<'a>(store: &'a TaskStore, id: &TaskId) -> &'a str {
    store.get_task(id).map_or("", |t| t.content.as_str())
}

/// Show progress statistics
pub fn stats(output: &Output) -> Result<()> {
    let store = open()?;
    let stats = store.get_progress_stats();

    if output.is_json() {
        output.data(&stats);
        return Ok(());
    }

    println!("Progress");
    println!("{}", "=".repeat(40));
    println!("Tasks: {} total", stats.total);
    println!("  [ ] Pending:     {}", stats.pending);
    println!("  [~] In Progress: {}", stats.in_progress);
    println!("  [x] Completed:   {}", stats.completed);
    println!("  [!] Blocked:     {}", stats.blocked);
    println!("  [-] Failed:      {}", stats.failed);
    println!();
    println!("Completion: {:.0}%", stats.completion_rate * 100.0);

    Ok(())
}

/// Show tasks ready to work on
pub fn ready(output: &Output) -> Result<()> {
    let store = open()?;
    let ready = store.dependency_graph().ready_tasks();
    debug!(count = ready.len(), "found ready tasks");

    if output.is_json() {
        let items: Vec<_> = ready
            .iter()
            .map(|id| serde_json::json!({ "id": id, "content": content_of(&store, id) }))
            .collect();
        output.data(&items);
    } else if ready.is_empty() {
        println!("No tasks ready to work on.");
    } else {
        println!("Ready tasks ({}):", ready.len());
        println!("{:<10} TASK", "ID");
        println!("{}", "-".repeat(60));
        for id in &ready {
            println!("{:<10} {}", id, content_of(&store, id));
        }
    }

    Ok(())
}

/// Show tasks waiting on unfinished dependencies
pub fn blocked(output: &Output) -> Result<()> {
    let store = open()?;
    let graph = store.dependency_graph();

    let blocked: Vec<(TaskId, Vec<TaskId>)> = graph
        .blocked_tasks()
        .into_iter()
        .map(|id| {
            let waiting_on = graph
                .dependencies(&id)
                .into_iter()
                .filter(|dep| graph.node(dep).is_some_and(|n| !n.status.is_complete()))
                .collect();
            (id, waiting_on)
        })
        .collect();

    if output.is_json() {
        let items: Vec<_> = blocked
            .iter()
            .map(|(id, waiting_on)| {
                serde_json::json!({
                    "id": id,
                    "content": content_of(&store, id),
                    "blockedBy": waiting_on,
                })
            })
            .collect();
        output.data(&items);
    } else if blocked.is_empty() {
        println!("No blocked tasks.");
    } else {
        println!("Blocked tasks ({}):", blocked.len());
        println!("{:<10} {:<30} BLOCKED BY", "ID", "TASK");
        println!("{}", "-".repeat(70));
        for (id, waiting_on) in &blocked {
            let names: Vec<&str> = waiting_on.iter().map(TaskId::as_str).collect();
            println!("{:<10} {:<30} {}", id, content_of(&store, id), names.join(", "));
        }
    }

    Ok(())
}

/// Show the dependency graph
pub fn graph(output: &Output) -> Result<()> {
    let store = open()?;
    let graph = store.dependency_graph();

    if output.is_json() {
        let nodes: Vec<_> = graph.nodes().collect();
        let unresolved: Vec<_> = graph
            .unresolved()
            .iter()
            .map(|(task, dep)| serde_json::json!({ "task": task, "dependsOn": dep }))
            .collect();
        output.data(&serde_json::json!({
            "nodes": nodes,
            "cycle": graph.cycle(),
            "criticalPath": graph.critical_path(),
            "unresolved": unresolved,
        }));
        return Ok(());
    }

    if graph.is_empty() {
        println!("No tasks");
        return Ok(());
    }

    println!("{:<10} {:<6} {:<12} {:<24} FLAGS", "ID", "LEVEL", "STATUS", "DEPENDS ON");
    println!("{}", "-".repeat(70));
    for node in graph.nodes() {
        let deps: Vec<&str> = node.depends_on.iter().map(TaskId::as_str).collect();
        let mut flags = Vec::new();
        if node.is_critical_path {
            flags.push("critical");
        }
        if node.can_run_parallel {
            flags.push("parallel");
        }
        println!(
            "{:<10} {:<6} {:<12} {:<24} {}",
            node.id,
            node.level,
            node.status,
            deps.join(","),
            flags.join(",")
        );
    }

    if graph.cycle().detected {
        let path: Vec<&str> = graph.cycle().path.iter().map(TaskId::as_str).collect();
        println!();
        println!("Cycle: {}", path.join(" -> "));
    }

    if !graph.unresolved().is_empty() {
        println!();
        println!("Unknown dependencies:");
        for (task, dep) in graph.unresolved() {
            println!("  {} -> {}", task, dep);
        }
    }

    Ok(())
}

/// Show the execution plan and critical path
pub fn plan(output: &Output) -> Result<()> {
    let store = open()?;
    let graph = store.dependency_graph();

    if output.is_json() {
        output.data(&serde_json::json!({
            "steps": graph.execution_plan(),
            "criticalPath": graph.critical_path(),
        }));
        return Ok(());
    }

    let rendered = graph.render_plan();
    if rendered.is_empty() {
        println!("Nothing left to do.");
    } else {
        print!("{}", rendered);
    }

    if !graph.critical_path().is_empty() {
        let path: Vec<&str> = graph.critical_path().iter().map(TaskId::as_str).collect();
        println!();
        println!("Critical path: {}", path.join(" -> "));
    }

    Ok(())
}

/// List milestones, optionally detecting new ones first
pub fn milestones(output: &Output, sync: bool) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store()?;

    let discovered = if sync {
        let detector = project.detector()?;
        store.sync_milestones(&detector)?
    } else {
        Vec::new()
    };

    let milestones = store.get_all_milestones();

    if output.is_json() {
        output.data(&serde_json::json!({
            "milestones": milestones,
            "discovered": discovered,
        }));
        return Ok(());
    }

    if !discovered.is_empty() {
        println!("Detected {} new milestone(s)", discovered.len());
        println!();
    }

    if milestones.is_empty() {
        println!("No milestones");
        return Ok(());
    }

    println!("{:<20} {:<12} {:<10} {:<6} NAME", "ID", "STATUS", "TYPE", "TASKS");
    println!("{}", "-".repeat(70));
    for milestone in milestones {
        println!(
            "{:<20} {:<12} {:<10} {:<6} {}",
            milestone.id,
            milestone.status,
            milestone.kind.as_str(),
            milestone.task_ids.len(),
            milestone.name
        );
    }

    Ok(())
}

/// Suggest task groupings
pub fn suggest(output: &Output) -> Result<()> {
    let store = open()?;
    let suggestions = suggest_groupings(store.get_all_tasks());

    if output.is_json() {
        output.data(&suggestions);
        return Ok(());
    }

    if suggestions.is_empty() {
        println!("No suggestions.");
        return Ok(());
    }

    for suggestion in &suggestions {
        let ids: Vec<&str> = suggestion.task_ids.iter().map(TaskId::as_str).collect();
        println!(
            "{} ({:.0}%): {}",
            suggestion.name,
            suggestion.confidence * 100.0,
            suggestion.reason
        );
        println!("  {}", ids.join(", "));
    }

    Ok(())
}
