//! CLI integration tests for taskgraph
//!
//! These tests verify the complete workflow from initialization through
//! task management, ensuring commands work together correctly.

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command instance for the taskgraph binary, isolated from the
/// user's global config
fn taskgraph_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("taskgraph"));
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".xdg"))
        .env_remove("RUST_LOG");
    cmd
}

/// Create a temporary directory and initialize a taskgraph project
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    taskgraph_cmd(dir.path()).arg("init").assert().success();
    dir
}

/// Runs a command with JSON output and parses stdout
fn json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = taskgraph_cmd(dir)
        .args(args)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "command {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Adds a task and returns its ID
fn add_task(dir: &Path, args: &[&str]) -> String {
    let mut full = vec!["task", "add"];
    full.extend_from_slice(args);
    json(dir, &full)["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_init_creates_structure() {
    let dir = TempDir::new().unwrap();

    taskgraph_cmd(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized taskgraph project"));

    assert!(dir.path().join(".taskgraph").is_dir());
    assert!(dir.path().join(".taskgraph/config.toml").is_file());
    assert!(dir.path().join(".taskgraph/.gitignore").is_file());
}

#[test]
fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();

    taskgraph_cmd(dir.path()).arg("init").assert().success();
    taskgraph_cmd(dir.path()).arg("init").assert().success();
}

#[test]
fn test_commands_require_project() {
    let dir = TempDir::new().unwrap();

    taskgraph_cmd(dir.path())
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not in a taskgraph project"));
}

// =============================================================================
// Task Tests
// =============================================================================

#[test]
fn test_task_add_persists_snapshot() {
    let dir = setup_project();

    taskgraph_cmd(dir.path())
        .args(["task", "add", "Write the parser"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created task: t-"));

    assert!(dir.path().join(".taskgraph/snapshot.json").is_file());
}

#[test]
fn test_task_lifecycle() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Ship it", "--active-form", "Shipping it"]);

    taskgraph_cmd(dir.path())
        .args(["task", "start", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("in_progress"));

    let shown = json(dir.path(), &["task", "show", &id]);
    assert_eq!(shown["task"]["status"], "in_progress");
    assert!(shown["task"]["metadata"]["startedAt"].is_string());

    taskgraph_cmd(dir.path())
        .args(["task", "done", &id])
        .assert()
        .success();

    let shown = json(dir.path(), &["task", "show", &id]);
    assert_eq!(shown["task"]["status"], "completed");
    assert!(shown["task"]["metadata"]["completedAt"].is_string());
}

#[test]
fn test_task_add_rejects_unknown_parent() {
    let dir = setup_project();

    taskgraph_cmd(dir.path())
        .args(["task", "add", "Orphan", "--parent", "t-0000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown parent task"));
}

#[test]
fn test_task_add_rejects_long_content() {
    let dir = setup_project();
    fs::write(
        dir.path().join(".taskgraph/config.toml"),
        "[store]\nmax_content_length = 10\n",
    )
    .unwrap();

    taskgraph_cmd(dir.path())
        .args(["task", "add", "This is far too long"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation failed"));
}

#[test]
fn test_task_list_shows_hierarchy() {
    let dir = setup_project();
    let parent = add_task(dir.path(), &["Backend"]);
    add_task(dir.path(), &["Schema", "--parent", &parent]);

    taskgraph_cmd(dir.path())
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backend"))
        .stdout(predicate::str::contains("  Schema"));
}

#[test]
fn test_task_remove_reparents_children() {
    let dir = setup_project();
    let grandparent = add_task(dir.path(), &["G"]);
    let parent = add_task(dir.path(), &["P", "--parent", &grandparent]);
    let child = add_task(dir.path(), &["C", "--parent", &parent]);

    taskgraph_cmd(dir.path())
        .args(["task", "remove", &parent])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 task(s)"));

    let shown = json(dir.path(), &["task", "show", &child]);
    assert_eq!(shown["task"]["parentId"], grandparent.as_str());
}

#[test]
fn test_task_remove_cascade() {
    let dir = setup_project();
    let parent = add_task(dir.path(), &["P"]);
    add_task(dir.path(), &["C", "--parent", &parent]);

    taskgraph_cmd(dir.path())
        .args(["task", "remove", &parent, "--cascade"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 task(s)"));

    let stats = json(dir.path(), &["stats"]);
    assert_eq!(stats["total"], 0);
}

#[test]
fn test_task_move_rejects_cycle() {
    let dir = setup_project();
    let a = add_task(dir.path(), &["A"]);
    let b = add_task(dir.path(), &["B", "--parent", &a]);

    taskgraph_cmd(dir.path())
        .args(["task", "move", &a, "--parent", &b])
        .assert()
        .failure()
        .stderr(predicate::str::contains("its own ancestor"));
}

#[test]
fn test_task_edit() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Draft"]);

    let edited = json(
        dir.path(),
        &["task", "edit", &id, "--content", "Final", "--priority", "high", "--tag", "docs"],
    );

    assert_eq!(edited["content"], "Final");
    assert_eq!(edited["priority"], "high");
    assert_eq!(edited["metadata"]["tags"][0], "docs");
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_stats() {
    let dir = setup_project();
    let setup = add_task(dir.path(), &["Phase 1: Setup"]);
    add_task(dir.path(), &["Phase 1: Config"]);

    taskgraph_cmd(dir.path())
        .args(["task", "done", &setup])
        .assert()
        .success();

    let stats = json(dir.path(), &["stats"]);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["completionRate"], 0.5);

    taskgraph_cmd(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Completion: 50%"));
}

#[test]
fn test_ready_and_blocked() {
    let dir = setup_project();
    let first = add_task(dir.path(), &["First"]);
    let second = add_task(dir.path(), &["Second", "--depends-on", &first]);

    let ready = json(dir.path(), &["ready"]);
    let ready_ids: Vec<&str> = ready
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ready_ids, vec![first.as_str()]);

    let blocked = json(dir.path(), &["blocked"]);
    assert_eq!(blocked[0]["id"], second.as_str());
    assert_eq!(blocked[0]["blockedBy"][0], first.as_str());

    taskgraph_cmd(dir.path())
        .args(["task", "done", &first])
        .assert()
        .success();

    let ready = json(dir.path(), &["ready"]);
    assert_eq!(ready[0]["id"], second.as_str());
}

#[test]
fn test_plan_groups_parallel_work() {
    let dir = setup_project();
    let root = add_task(dir.path(), &["Design"]);
    let api = add_task(dir.path(), &["API", "--depends-on", &root]);
    let ui = add_task(dir.path(), &["UI", "--depends-on", &root]);

    let plan = json(dir.path(), &["plan"]);
    assert_eq!(plan["steps"][0][0], root.as_str());
    assert_eq!(plan["steps"][1][0], api.as_str());
    assert_eq!(plan["steps"][1][1], ui.as_str());

    taskgraph_cmd(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Step 2 (parallel)"))
        .stdout(predicate::str::contains("Critical path:"));
}

#[test]
fn test_graph_reports_cycle() {
    let dir = setup_project();
    let a = add_task(dir.path(), &["A"]);
    let b = add_task(dir.path(), &["B", "--depends-on", &a]);

    taskgraph_cmd(dir.path())
        .args(["task", "dep", &a, &b])
        .assert()
        .success()
        .stderr(predicate::str::contains("dependency cycle"));

    let graph = json(dir.path(), &["graph"]);
    assert_eq!(graph["cycle"]["detected"], true);
}

#[test]
fn test_dep_requires_existing_dependency() {
    let dir = setup_project();
    let a = add_task(dir.path(), &["A"]);

    taskgraph_cmd(dir.path())
        .args(["task", "dep", &a, "t-missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Dependency task not found"));
}

// =============================================================================
// Milestone Tests
// =============================================================================

#[test]
fn test_milestones_sync() {
    let dir = setup_project();
    add_task(dir.path(), &["Phase 1: Setup"]);
    add_task(dir.path(), &["Phase 1: Config"]);
    add_task(dir.path(), &["Release v1.2.0"]);

    let synced = json(dir.path(), &["milestones", "--sync"]);
    let discovered: Vec<&str> = synced["discovered"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap())
        .collect();
    assert_eq!(discovered, vec!["phase:1", "release:1.2.0"]);

    // Second sync finds nothing new
    let again = json(dir.path(), &["milestones", "--sync"]);
    assert_eq!(again["discovered"].as_array().unwrap().len(), 0);

    taskgraph_cmd(dir.path())
        .arg("milestones")
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase 1"))
        .stdout(predicate::str::contains("Release 1.2.0"));
}

#[test]
fn test_custom_milestone_rule() {
    let dir = setup_project();
    fs::write(
        dir.path().join(".taskgraph/config.toml"),
        r#"
[[milestones.rules]]
id = "epic"
name = "Epic"
pattern = '(?i)\bepic\s*:\s*([\w-]+)'
type = "feature"
"#,
    )
    .unwrap();
    add_task(dir.path(), &["Epic: payments"]);

    let synced = json(dir.path(), &["milestones", "--sync"]);
    assert_eq!(synced["discovered"][0], "epic:payments");
}

#[test]
fn test_assign_to_unknown_milestone_fails() {
    let dir = setup_project();
    let id = add_task(dir.path(), &["Loose"]);

    taskgraph_cmd(dir.path())
        .args(["task", "assign", &id, "phase:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Milestone not found"));
}

#[test]
fn test_suggest() {
    let dir = setup_project();
    add_task(dir.path(), &["Refactor parser"]);
    add_task(dir.path(), &["Refactor lexer"]);

    let suggestions = json(dir.path(), &["suggest"]);
    assert_eq!(suggestions[0]["task_ids"].as_array().unwrap().len(), 2);
}

// =============================================================================
// Import Tests
// =============================================================================

#[test]
fn test_import() {
    let dir = setup_project();
    let file = dir.path().join("tasks.json");
    fs::write(
        &file,
        r#"[{"content": "One", "activeForm": "Doing one"}, {"content": "Two", "priority": "high"}]"#,
    )
    .unwrap();

    let imported = json(dir.path(), &["import", file.to_str().unwrap()]);
    assert_eq!(imported["imported"].as_array().unwrap().len(), 2);

    let stats = json(dir.path(), &["stats"]);
    assert_eq!(stats["total"], 2);
}

#[test]
fn test_import_rejects_malformed_payload() {
    let dir = setup_project();
    let file = dir.path().join("tasks.json");
    fs::write(&file, "not json").unwrap();

    taskgraph_cmd(dir.path())
        .args(["import", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed import payload"));
}

// =============================================================================
// Output Format Tests
// =============================================================================

// Global config lives under XDG_CONFIG_HOME only on Linux
#[cfg(target_os = "linux")]
#[test]
fn test_global_default_format() {
    let dir = setup_project();
    let config_dir = dir.path().join(".xdg/taskgraph");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "default_format = \"json\"\n").unwrap();

    let output = taskgraph_cmd(dir.path()).arg("stats").output().unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total"], 0);
}
