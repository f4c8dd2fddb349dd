//! Dependency graph analysis for tasks
//!
//! Builds a read-only graph from each task's `metadata.dependencies` and
//! computes scheduling levels, a cycle report, the critical path and the
//! parallel groups. Hierarchy edges (parent/child) play no part here.
//!
//! The graph is rebuilt per query and never fails on malformed input:
//! dependency IDs that don't resolve to a task are ignored for edges and
//! levels alike and surface through [`DependencyGraph::unresolved`]. Cycles
//! are reported, not rejected, and levels stay best-effort when one exists.
//!
//! Traversals use explicit stacks, so deep chains can't overflow the call
//! stack. Uses petgraph for node storage and component analysis.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use tracing::{info, instrument, warn};

use super::id::TaskId;
use super::task::{Task, TaskStatus};

/// A task's position in the dependency graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyNode {
    pub id: TaskId,

    pub status: TaskStatus,

    /// Longest-path distance from a task with no dependencies
    pub level: usize,

    /// Dependency IDs as declared, including unresolved ones
    pub depends_on: Vec<TaskId>,

    /// Tasks that depend on this one, in task order
    pub dependents: Vec<TaskId>,

    pub is_critical_path: bool,

    /// True when at least one other task shares this level
    pub can_run_parallel: bool,
}

/// Result of the cycle detection pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub detected: bool,

    /// The first cycle found, from its first occurrence to the repeat
    /// (`[a, b, c, a]`). Empty when no cycle exists.
    pub path: Vec<TaskId>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Stack frame for the iterative traversals
struct Frame {
    node: usize,
    next: usize,
    /// Highest dependency level seen so far (levels pass only)
    best: Option<usize>,
}

impl Frame {
    fn new(node: usize) -> Self {
        Self {
            node,
            next: 0,
            best: None,
        }
    }
}

/// An analyzed dependency graph
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Edges run dependency -> dependent
    graph: DiGraph<DependencyNode, ()>,

    /// Map from TaskId to node index
    node_map: HashMap<TaskId, NodeIndex>,

    /// Resolved dependency indices per node, in declared order
    deps: Vec<Vec<usize>>,

    /// (task, missing dependency) pairs
    unresolved: Vec<(TaskId, TaskId)>,

    cycle: CycleReport,

    critical_path: Vec<TaskId>,
}

impl DependencyGraph {
    /// Builds and analyzes a graph from a collection of tasks
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut graph = Self::default();

        // First pass: add all nodes
        let tasks: Vec<_> = tasks.into_iter().collect();
        for task in &tasks {
            if graph.node_map.contains_key(&task.id) {
                continue;
            }
            let idx = graph.graph.add_node(DependencyNode {
                id: task.id.clone(),
                status: task.status,
                level: 0,
                depends_on: task.metadata.dependencies.clone(),
                dependents: Vec::new(),
                is_critical_path: false,
                can_run_parallel: false,
            });
            graph.node_map.insert(task.id.clone(), idx);
        }

        // Second pass: resolve dependencies into edges
        let mut deps = vec![Vec::new(); graph.graph.node_count()];
        for idx in graph.graph.node_indices() {
            let declared = graph.graph[idx].depends_on.clone();
            for dep_id in declared {
                match graph.node_map.get(&dep_id) {
                    Some(&dep_idx) => {
                        if !deps[idx.index()].contains(&dep_idx.index()) {
                            deps[idx.index()].push(dep_idx.index());
                            graph.graph.update_edge(dep_idx, idx, ());
                        }
                    }
                    None => graph
                        .unresolved
                        .push((graph.graph[idx].id.clone(), dep_id)),
                }
            }
        }
        graph.deps = deps;

        // Reverse edges, in task order
        for idx in graph.graph.node_indices() {
            let mut dependents: Vec<NodeIndex> = graph
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();
            dependents.sort();
            graph.graph[idx].dependents = dependents
                .into_iter()
                .map(|d| graph.graph[d].id.clone())
                .collect();
        }

        graph.analyze();

        info!(
            task_count = graph.len(),
            unresolved = graph.unresolved.len(),
            cycle = graph.cycle.detected,
            critical_path_len = graph.critical_path.len(),
            "dependency graph built"
        );

        graph
    }

    fn analyze(&mut self) {
        if !self.unresolved.is_empty() {
            warn!(
                count = self.unresolved.len(),
                "ignoring dependencies on unknown tasks"
            );
        }

        let levels = compute_levels(&self.deps);
        for idx in self.graph.node_indices() {
            self.graph[idx].level = levels[idx.index()];
        }

        self.cycle = match detect_cycle(&self.deps) {
            Some(path) => {
                let path: Vec<TaskId> = path.into_iter().map(|i| self.id_at(i)).collect();
                let rendered: Vec<&str> = path.iter().map(TaskId::as_str).collect();
                warn!(path = %rendered.join(" -> "), "dependency cycle detected");
                CycleReport {
                    detected: true,
                    path,
                }
            }
            None => CycleReport::default(),
        };

        self.mark_critical_path();
        self.mark_parallel();
    }

    fn id_at(&self, index: usize) -> TaskId {
        self.graph[NodeIndex::new(index)].id.clone()
    }

    /// Traces the deepest chain ending at a terminal node (no dependents),
    /// at each step following the highest-level dependency.
    fn mark_critical_path(&mut self) {
        let mut terminal: Option<NodeIndex> = None;
        for idx in self.graph.node_indices() {
            if !self.graph[idx].dependents.is_empty() {
                continue;
            }
            match terminal {
                Some(best) if self.graph[best].level >= self.graph[idx].level => {}
                _ => terminal = Some(idx),
            }
        }

        let Some(start) = terminal else {
            self.critical_path.clear();
            return;
        };

        let mut path = vec![start.index()];
        let mut seen: HashSet<usize> = HashSet::from([start.index()]);
        let mut current = start.index();

        loop {
            let mut next: Option<usize> = None;
            for &dep in &self.deps[current] {
                if seen.contains(&dep) {
                    continue;
                }
                let level = self.graph[NodeIndex::new(dep)].level;
                match next {
                    Some(n) if self.graph[NodeIndex::new(n)].level >= level => {}
                    _ => next = Some(dep),
                }
            }

            match next {
                Some(dep) => {
                    seen.insert(dep);
                    path.push(dep);
                    current = dep;
                }
                None => break,
            }
        }

        path.reverse();
        for &i in &path {
            self.graph[NodeIndex::new(i)].is_critical_path = true;
        }
        self.critical_path = path.into_iter().map(|i| self.id_at(i)).collect();
    }

    fn mark_parallel(&mut self) {
        let mut per_level: HashMap<usize, usize> = HashMap::new();
        for node in self.graph.node_weights() {
            *per_level.entry(node.level).or_default() += 1;
        }
        for node in self.graph.node_weights_mut() {
            node.can_run_parallel = per_level.get(&node.level).copied().unwrap_or(0) >= 2;
        }
    }

    /// Returns a node by task ID
    pub fn node(&self, task_id: &TaskId) -> Option<&DependencyNode> {
        self.node_map.get(task_id).map(|&idx| &self.graph[idx])
    }

    /// Iterates over nodes in task order
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.graph.node_weights()
    }

    /// Returns the level of a task
    pub fn level(&self, task_id: &TaskId) -> Option<usize> {
        self.node(task_id).map(|n| n.level)
    }

    /// Returns the cycle report
    pub fn cycle(&self) -> &CycleReport {
        &self.cycle
    }

    /// Returns the critical path, dependencies first
    pub fn critical_path(&self) -> &[TaskId] {
        &self.critical_path
    }

    /// Returns (task, missing dependency) pairs that were ignored
    pub fn unresolved(&self) -> &[(TaskId, TaskId)] {
        &self.unresolved
    }

    /// Returns all nodes grouped by level, lowest first, in task order
    pub fn levels(&self) -> Vec<Vec<TaskId>> {
        self.grouped_by_level(|_| true)
    }

    /// Returns the sequential steps to finish the remaining work. Members of
    /// a step may run concurrently. Completed tasks are left out.
    pub fn execution_plan(&self) -> Vec<Vec<TaskId>> {
        self.grouped_by_level(|node| !node.status.is_complete())
    }

    fn grouped_by_level(&self, include: impl Fn(&DependencyNode) -> bool) -> Vec<Vec<TaskId>> {
        let max_level = self.nodes().map(|n| n.level).max().unwrap_or(0);
        let mut groups: Vec<Vec<TaskId>> = vec![Vec::new(); max_level + 1];

        for node in self.nodes().filter(|n| include(n)) {
            groups[node.level].push(node.id.clone());
        }

        groups.retain(|g| !g.is_empty());
        groups
    }

    /// Renders the execution plan as text, one step per line
    pub fn render_plan(&self) -> String {
        let mut out = String::new();
        for (i, step) in self.execution_plan().iter().enumerate() {
            let ids: Vec<&str> = step.iter().map(TaskId::as_str).collect();
            let marker = if step.len() > 1 { " (parallel)" } else { "" };
            let _ = writeln!(out, "Step {}{}: {}", i + 1, marker, ids.join(", "));
        }
        out
    }

    /// Returns tasks that are ready (not completed, all known dependencies
    /// completed)
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                let node = &self.graph[idx];
                !node.status.is_complete()
                    && self.deps[idx.index()]
                        .iter()
                        .all(|&d| self.graph[NodeIndex::new(d)].status.is_complete())
            })
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    /// Returns tasks that are blocked (not completed, at least one known
    /// dependency not completed)
    pub fn blocked_tasks(&self) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                let node = &self.graph[idx];
                !node.status.is_complete()
                    && self.deps[idx.index()]
                        .iter()
                        .any(|&d| !self.graph[NodeIndex::new(d)].status.is_complete())
            })
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    /// Returns the resolved direct dependencies of a task
    pub fn dependencies(&self, task_id: &TaskId) -> Vec<TaskId> {
        match self.node_map.get(task_id) {
            Some(idx) => self.deps[idx.index()]
                .iter()
                .map(|&d| self.id_at(d))
                .collect(),
            None => vec![],
        }
    }

    /// Returns the direct dependents of a task (tasks that depend on it)
    pub fn dependents(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.node(task_id)
            .map(|n| n.dependents.clone())
            .unwrap_or_default()
    }

    /// Returns all tasks in topological order, or `None` if a cycle exists
    pub fn topological_order(&self) -> Option<Vec<TaskId>> {
        toposort(&self.graph, None)
            .ok()
            .map(|order| order.into_iter().map(|idx| self.graph[idx].id.clone()).collect())
    }

    /// Returns every group of tasks that sit on a common cycle
    pub fn cyclic_components(&self) -> Vec<Vec<TaskId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&idx| self.graph.contains_edge(idx, idx))
            })
            .map(|mut component| {
                component.sort();
                component.into_iter().map(|idx| self.graph[idx].id.clone()).collect()
            })
            .collect()
    }

    /// Returns true if the graph contains the task
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.node_map.contains_key(task_id)
    }

    /// Returns the number of tasks in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}

/// Longest-path levels. A dependency that is still in progress on the
/// traversal stack (a cycle) contributes level 0 instead of recursing.
#[instrument(skip_all, fields(node_count = deps.len()))]
fn compute_levels(deps: &[Vec<usize>]) -> Vec<usize> {
    let mut levels = vec![0usize; deps.len()];
    let mut marks = vec![Mark::Unvisited; deps.len()];

    for start in 0..deps.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        let mut stack = vec![Frame::new(start)];

        while let Some(frame) = stack.last_mut() {
            if let Some(&dep) = deps[frame.node].get(frame.next) {
                frame.next += 1;
                match marks[dep] {
                    Mark::Done => frame.best = frame.best.max(Some(levels[dep])),
                    Mark::InProgress => frame.best = frame.best.max(Some(0)),
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push(Frame::new(dep));
                    }
                }
                continue;
            }

            let node = frame.node;
            let level = frame.best.map_or(0, |best| best + 1);
            stack.pop();
            levels[node] = level;
            marks[node] = Mark::Done;
            if let Some(parent) = stack.last_mut() {
                parent.best = parent.best.max(Some(level));
            }
        }
    }

    levels
}

/// Depth-first search with a recursion stack. Returns the first cycle found
/// as the stack slice from the repeated node, with the repeat appended.
#[instrument(skip_all, fields(node_count = deps.len()))]
fn detect_cycle(deps: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; deps.len()];

    for start in 0..deps.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        let mut stack = vec![Frame::new(start)];

        while let Some(frame) = stack.last_mut() {
            if let Some(&dep) = deps[frame.node].get(frame.next) {
                frame.next += 1;
                match marks[dep] {
                    Mark::InProgress => {
                        let mut path: Vec<usize> = stack
                            .iter()
                            .map(|f| f.node)
                            .skip_while(|&n| n != dep)
                            .collect();
                        path.push(dep);
                        return Some(path);
                    }
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push(Frame::new(dep));
                    }
                    Mark::Done => {}
                }
                continue;
            }

            marks[frame.node] = Mark::Done;
            stack.pop();
        }
    }

    None
}
