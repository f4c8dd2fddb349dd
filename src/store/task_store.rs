//! In-memory task store
//!
//! The store owns every task and registered milestone. Each public mutation
//! validates its input, applies the change, writes a snapshot when
//! persistence is enabled, then delivers events, all before returning.
//!
//! Listeners are plain closures without `Send`, so the store stays on the
//! thread that created it. Readers that need to hand data elsewhere should
//! clone what they read.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::error::StoreError;
use super::events::{EventBus, EventKind, SubscriptionId, TaskEvent};
use crate::domain::{
    calculate_milestone_status, DependencyGraph, Milestone, MilestoneDetector, MilestoneId,
    NewTask, Priority, ProgressStats, Task, TaskId, TaskStatus,
};
use crate::storage::{Snapshot, SnapshotFile, StoreConfig};

/// Owner of all task records
pub struct TaskStore {
    config: StoreConfig,

    tasks: HashMap<TaskId, Task>,

    /// Insertion order
    order: Vec<TaskId>,

    milestones: BTreeMap<MilestoneId, Milestone>,

    events: EventBus,

    snapshot: Option<SnapshotFile>,

    /// Mixed into generated IDs so a collision can be re-rolled
    salt: u64,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::in_memory(StoreConfig::default())
    }
}

impl TaskStore {
    /// Creates a store. When persistence is enabled and a snapshot exists,
    /// its state replaces the empty initial state.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        config
            .validate()
            .map_err(|e| StoreError::Validation(e.to_string()))?;

        let snapshot = config.snapshot_path().map(SnapshotFile::new);
        let mut store = Self::in_memory(config);
        store.snapshot = snapshot;

        if let Some(file) = store.snapshot.clone() {
            if let Some(state) = file.read().map_err(StoreError::Persistence)? {
                store.load_snapshot(state)?;
            }
        }

        Ok(store)
    }

    /// Creates a store that never touches disk, whatever the persistence
    /// settings say
    pub fn in_memory(config: StoreConfig) -> Self {
        Self {
            config,
            tasks: HashMap::new(),
            order: Vec::new(),
            milestones: BTreeMap::new(),
            events: EventBus::new(),
            snapshot: None,
            salt: 0,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Registers a listener for one kind of event
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: FnMut(&TaskEvent) -> anyhow::Result<()> + 'static,
    {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Adds a task and returns its assigned ID
    pub fn add_task(&mut self, new: NewTask) -> Result<TaskId, StoreError> {
        let id = self.insert_task(new, Utc::now())?;
        let event = TaskEvent::TaskAdded {
            task: self.tasks[&id].clone(),
        };
        self.commit(vec![event])?;
        Ok(id)
    }

    /// Moves a task to a new status
    pub fn update_task_status(&mut self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::unknown_task(id))?;

        let old_status = task.transition(status, Utc::now());
        debug!(task_id = %id, from = %old_status, to = %status, "task status changed");

        let events = vec![
            TaskEvent::TaskStatusChanged {
                task_id: id.clone(),
                old_status,
                new_status: status,
            },
            TaskEvent::TaskUpdated { task: task.clone() },
        ];
        self.commit(events)
    }

    /// Replaces a task's descriptions. The active form is kept when `None`.
    pub fn update_task_content(
        &mut self,
        id: &TaskId,
        content: impl Into<String>,
        active_form: Option<String>,
    ) -> Result<(), StoreError> {
        let content = content.into();
        if !self.tasks.contains_key(id) {
            return Err(StoreError::unknown_task(id));
        }
        self.validate_content(&content)?;

        self.modify(id, |task| {
            task.content = content;
            if let Some(active_form) = active_form {
                task.active_form = active_form;
            }
        })
    }

    pub fn set_priority(&mut self, id: &TaskId, priority: Option<Priority>) -> Result<(), StoreError> {
        self.modify(id, |task| task.priority = priority)
    }

    /// Replaces the dependency list. Duplicates and self-references are
    /// dropped.
    pub fn set_dependencies(&mut self, id: &TaskId, deps: Vec<TaskId>) -> Result<(), StoreError> {
        self.modify(id, |task| {
            task.metadata.dependencies.clear();
            for dep in deps {
                task.add_dependency(dep);
            }
        })
    }

    pub fn add_dependency(&mut self, id: &TaskId, dep: TaskId) -> Result<(), StoreError> {
        self.modify(id, |task| {
            task.add_dependency(dep);
        })
    }

    pub fn add_tags(&mut self, id: &TaskId, tags: Vec<String>) -> Result<(), StoreError> {
        self.modify(id, |task| {
            for tag in tags {
                task.add_tag(tag);
            }
        })
    }

    pub fn set_notes(&mut self, id: &TaskId, notes: Option<String>) -> Result<(), StoreError> {
        self.modify(id, |task| task.metadata.notes = notes)
    }

    /// Sets the estimate, in milliseconds
    pub fn set_estimated_duration(&mut self, id: &TaskId, millis: Option<i64>) -> Result<(), StoreError> {
        self.modify(id, |task| task.metadata.estimated_duration = millis)
    }

    /// Moves a task under a new parent, or to the root when `None`
    pub fn move_task(&mut self, id: &TaskId, new_parent: Option<TaskId>) -> Result<(), StoreError> {
        let old_parent = self
            .tasks
            .get(id)
            .ok_or_else(|| StoreError::unknown_task(id))?
            .parent_id
            .clone();

        if let Some(parent) = &new_parent {
            if !self.tasks.contains_key(parent) {
                return Err(StoreError::unknown_parent(parent));
            }
            self.check_ancestry(id, parent)?;
        }

        if old_parent == new_parent {
            return Ok(());
        }

        let now = Utc::now();
        if let Some(old) = old_parent.as_ref().and_then(|p| self.tasks.get_mut(p)) {
            old.children.retain(|c| c != id);
            old.touch(now);
        }
        if let Some(new) = new_parent.as_ref().and_then(|p| self.tasks.get_mut(p)) {
            new.children.push(id.clone());
            new.touch(now);
        }

        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::unknown_task(id))?;
        task.parent_id = new_parent;
        task.touch(now);

        debug!(task_id = %id, "task moved");
        let event = TaskEvent::TaskUpdated { task: task.clone() };
        self.commit(vec![event])
    }

    /// Removes a task.
    ///
    /// With `cascade`, descendants go first, children before their parents.
    /// Without it, the task's children move up to its parent (or become
    /// roots), taking its place in the parent's child list in order.
    pub fn remove_task(&mut self, id: &TaskId, cascade: bool) -> Result<(), StoreError> {
        let task = self
            .tasks
            .get(id)
            .ok_or_else(|| StoreError::unknown_task(id))?;

        let mut events = Vec::new();

        if cascade {
            let mut doomed = self.descendants_post_order(id);
            doomed.push(id.clone());

            for victim in doomed {
                if let Some(task) = self.detach_and_remove(&victim) {
                    events.push(TaskEvent::TaskRemoved { task });
                }
            }
        } else {
            let parent = task.parent_id.clone();
            let children = task.children.clone();
            let now = Utc::now();

            for child_id in &children {
                if let Some(child) = self.tasks.get_mut(child_id) {
                    child.parent_id = parent.clone();
                    child.touch(now);
                }
            }

            if let Some(grandparent) = parent.as_ref().and_then(|p| self.tasks.get_mut(p)) {
                match grandparent.children.iter().position(|c| c == id) {
                    Some(pos) => {
                        grandparent.children.splice(pos..=pos, children.iter().cloned());
                    }
                    None => grandparent.children.extend(children.iter().cloned()),
                }
                grandparent.touch(now);
            }

            if let Some(task) = self.tasks.get_mut(id) {
                task.children.clear();
            }
            if let Some(task) = self.detach_and_remove(id) {
                events.push(TaskEvent::TaskRemoved { task });
            }

            events.extend(children.iter().filter_map(|c| {
                self.tasks
                    .get(c)
                    .map(|task| TaskEvent::TaskUpdated { task: task.clone() })
            }));
        }

        let removed = events
            .iter()
            .filter(|e| e.kind() == EventKind::TaskRemoved)
            .count();
        debug!(task_id = %id, cascade, removed, "task removed");
        self.commit(events)
    }

    /// Removes every task and milestone
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let events: Vec<TaskEvent> = self
            .order
            .drain(..)
            .filter_map(|id| self.tasks.remove(&id))
            .map(|task| TaskEvent::TaskRemoved { task })
            .collect();
        self.tasks.clear();
        self.milestones.clear();
        self.commit(events)
    }

    /// Adds tasks from a JSON array of new-task entries.
    ///
    /// The whole payload is checked before anything is added: a malformed
    /// payload, an invalid entry or a missing reference leaves the store
    /// untouched.
    pub fn import_json(&mut self, payload: &str) -> Result<Vec<TaskId>, StoreError> {
        let entries: Vec<NewTask> = serde_json::from_str(payload)
            .map_err(|e| StoreError::Validation(format!("malformed import payload: {}", e)))?;

        if self.tasks.len() + entries.len() > self.config.max_tasks {
            return Err(StoreError::Validation(format!(
                "importing {} tasks would exceed the limit of {}",
                entries.len(),
                self.config.max_tasks
            )));
        }

        for (i, entry) in entries.iter().enumerate() {
            if let Err(StoreError::Validation(reason)) = self.validate_content(&entry.content) {
                return Err(StoreError::Validation(format!("entry {}: {}", i, reason)));
            }
            if let Some(parent) = &entry.parent_id {
                if !self.tasks.contains_key(parent) {
                    return Err(StoreError::unknown_parent(parent));
                }
            }
            if let Some(milestone) = &entry.milestone_id {
                if !self.milestones.contains_key(milestone) {
                    return Err(StoreError::unknown_milestone(milestone));
                }
            }
        }

        let now = Utc::now();
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            ids.push(self.insert_task(entry, now)?);
        }

        info!(count = ids.len(), "tasks imported");

        let events = ids
            .iter()
            .map(|id| TaskEvent::TaskAdded {
                task: self.tasks[id].clone(),
            })
            .collect();
        self.commit(events)?;
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Milestones
    // ------------------------------------------------------------------

    /// Registers a milestone, merging members into an existing one with the
    /// same ID. Members without a milestone are pointed at it.
    pub fn register_milestone(&mut self, milestone: Milestone) -> Result<(), StoreError> {
        if let Some(missing) = milestone.task_ids.iter().find(|id| !self.tasks.contains_key(*id)) {
            return Err(StoreError::unknown_task(missing));
        }

        let id = milestone.id.clone();
        let members = match self.milestones.entry(id.clone()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().merge_members(&milestone);
                existing.get().task_ids.clone()
            }
            Entry::Vacant(slot) => slot.insert(milestone).task_ids.clone(),
        };

        let events = self.claim_members(&id, &members, Utc::now());
        self.commit(events)
    }

    pub fn get_milestone(&self, id: &MilestoneId) -> Option<&Milestone> {
        self.milestones.get(id)
    }

    pub fn get_all_milestones(&self) -> Vec<&Milestone> {
        self.milestones.values().collect()
    }

    /// Moves a task into a milestone, or out of its current one with `None`
    pub fn assign_to_milestone(
        &mut self,
        task_id: &TaskId,
        milestone_id: Option<MilestoneId>,
    ) -> Result<(), StoreError> {
        if let Some(m) = &milestone_id {
            if !self.milestones.contains_key(m) {
                return Err(StoreError::MilestoneNotFound(m.clone()));
            }
        }

        let old = self
            .tasks
            .get(task_id)
            .ok_or_else(|| StoreError::unknown_task(task_id))?
            .milestone_id
            .clone();

        if old == milestone_id {
            return Ok(());
        }

        if let Some(previous) = old.as_ref().and_then(|m| self.milestones.get_mut(m)) {
            previous.remove_task(task_id);
        }
        if let Some(next) = milestone_id.as_ref().and_then(|m| self.milestones.get_mut(m)) {
            next.add_task(task_id.clone());
        }

        self.modify(task_id, |task| task.milestone_id = milestone_id)
    }

    /// Unregisters a milestone. Member tasks stay; only their back-reference
    /// is cleared.
    pub fn remove_milestone(&mut self, id: &MilestoneId) -> Result<Milestone, StoreError> {
        let milestone = self
            .milestones
            .remove(id)
            .ok_or_else(|| StoreError::MilestoneNotFound(id.clone()))?;

        let now = Utc::now();
        let mut events = Vec::new();
        for task_id in &self.order {
            if let Some(task) = self.tasks.get_mut(task_id) {
                if task.milestone_id.as_ref() == Some(id) {
                    task.milestone_id = None;
                    task.touch(now);
                    events.push(TaskEvent::TaskUpdated { task: task.clone() });
                }
            }
        }

        self.commit(events)?;
        Ok(milestone)
    }

    /// Runs detection over all tasks and merges the result into the
    /// registered milestones. Returns the IDs of milestones seen for the
    /// first time.
    pub fn sync_milestones(&mut self, detector: &MilestoneDetector) -> Result<Vec<MilestoneId>, StoreError> {
        let detected = detector.detect_milestones(self.get_all_tasks());
        let now = Utc::now();
        let mut discovered = Vec::new();
        let mut events = Vec::new();

        for milestone in detected {
            let id = milestone.id.clone();
            let members = match self.milestones.entry(id.clone()) {
                Entry::Occupied(mut existing) => {
                    let added = existing.get_mut().merge_members(&milestone);
                    if added > 0 {
                        debug!(milestone = %id, added, "milestone gained members");
                    }
                    milestone.task_ids
                }
                Entry::Vacant(slot) => {
                    info!(milestone = %id, name = %milestone.name, "new milestone detected");
                    discovered.push(id.clone());
                    slot.insert(milestone).task_ids.clone()
                }
            };
            events.extend(self.claim_members(&id, &members, now));
        }

        self.commit(events)?;
        Ok(discovered)
    }

    /// Points members without a milestone at `id`
    fn claim_members(&mut self, id: &MilestoneId, members: &[TaskId], now: DateTime<Utc>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        for task_id in members {
            if let Some(task) = self.tasks.get_mut(task_id) {
                if task.milestone_id.is_none() {
                    task.milestone_id = Some(id.clone());
                    task.touch(now);
                    events.push(TaskEvent::TaskUpdated { task: task.clone() });
                }
            }
        }
        events
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Returns all tasks in insertion order
    pub fn get_all_tasks(&self) -> Vec<&Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id)).collect()
    }

    /// Returns tasks without a parent, in insertion order
    pub fn get_root_tasks(&self) -> Vec<&Task> {
        self.get_all_tasks().into_iter().filter(|t| t.is_root()).collect()
    }

    /// Returns the direct children of a task, in order
    pub fn get_children(&self, id: &TaskId) -> Vec<&Task> {
        self.tasks
            .get(id)
            .map(|task| task.children.iter().filter_map(|c| self.tasks.get(c)).collect())
            .unwrap_or_default()
    }

    /// Returns every descendant of a task, pre-order
    pub fn get_descendants(&self, id: &TaskId) -> Vec<&Task> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<&TaskId> = match self.tasks.get(id) {
            Some(task) => task.children.iter().rev().collect(),
            None => return out,
        };

        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(task) = self.tasks.get(next) {
                out.push(task);
                stack.extend(task.children.iter().rev());
            }
        }

        out
    }

    /// Returns the ancestors of a task, nearest first
    pub fn get_ancestors(&self, id: &TaskId) -> Vec<&Task> {
        let mut out = Vec::new();
        let mut current = self.tasks.get(id).and_then(|t| t.parent_id.as_ref());

        while let Some(parent_id) = current {
            if out.len() > self.tasks.len() {
                break;
            }
            match self.tasks.get(parent_id) {
                Some(parent) => {
                    out.push(parent);
                    current = parent.parent_id.as_ref();
                }
                None => break,
            }
        }

        out
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.get_all_tasks()
            .into_iter()
            .filter(|t| t.status == status)
            .collect()
    }

    pub fn tasks_with_tag(&self, tag: &str) -> Vec<&Task> {
        self.get_all_tasks()
            .into_iter()
            .filter(|t| t.has_tag(tag))
            .collect()
    }

    pub fn get_progress_stats(&self) -> ProgressStats {
        ProgressStats::from_tasks(self.get_all_tasks())
    }

    /// Builds a dependency graph over the current tasks
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::from_tasks(self.get_all_tasks())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Captures the full store state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self.get_all_tasks(), self.milestones.values(), &self.config)
    }

    /// Replaces the store state with a snapshot. An inconsistent snapshot
    /// is rejected and the current state kept.
    pub fn load_snapshot(&mut self, snapshot: Snapshot) -> Result<(), StoreError> {
        let ordered = snapshot.ordered_tasks();
        let order: Vec<TaskId> = ordered.iter().map(|t| t.id.clone()).collect();
        let tasks: HashMap<TaskId, Task> = ordered.into_iter().map(|t| (t.id.clone(), t)).collect();

        let problems = integrity_violations(&tasks, &order, &snapshot.milestones);
        if !problems.is_empty() {
            return Err(StoreError::Persistence(anyhow::anyhow!(
                "snapshot is inconsistent: {}",
                problems.join("; ")
            )));
        }

        self.tasks = tasks;
        self.order = order;
        self.milestones = snapshot.milestones;
        debug!(tasks = self.tasks.len(), "store state replaced from snapshot");
        Ok(())
    }

    /// Writes a snapshot now. Returns false when persistence is off.
    pub fn save(&self) -> Result<bool, StoreError> {
        match &self.snapshot {
            Some(_) => self.persist().map(|_| true),
            None => Ok(false),
        }
    }

    /// Lists broken hierarchy or membership links. Empty in every state the
    /// public API can reach.
    pub fn integrity_violations(&self) -> Vec<String> {
        integrity_violations(&self.tasks, &self.order, &self.milestones)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn insert_task(&mut self, new: NewTask, now: DateTime<Utc>) -> Result<TaskId, StoreError> {
        self.validate_content(&new.content)?;

        if self.tasks.len() >= self.config.max_tasks {
            return Err(StoreError::Validation(format!(
                "task limit of {} reached",
                self.config.max_tasks
            )));
        }
        if let Some(parent) = &new.parent_id {
            if !self.tasks.contains_key(parent) {
                return Err(StoreError::unknown_parent(parent));
            }
        }
        if let Some(milestone) = &new.milestone_id {
            if !self.milestones.contains_key(milestone) {
                return Err(StoreError::unknown_milestone(milestone));
            }
        }

        let id = self.next_id(&new.content, now);
        if let Some(parent) = &new.parent_id {
            self.check_ancestry(&id, parent)?;
        }

        let task = new.into_task(id.clone(), now);
        if let Some(parent) = task.parent_id.as_ref().and_then(|p| self.tasks.get_mut(p)) {
            parent.children.push(id.clone());
        }
        if let Some(milestone) = task.milestone_id.as_ref().and_then(|m| self.milestones.get_mut(m)) {
            milestone.add_task(id.clone());
        }

        debug!(task_id = %id, parent = ?task.parent_id, "task added");
        self.order.push(id.clone());
        self.tasks.insert(id.clone(), task);
        Ok(id)
    }

    fn next_id(&mut self, content: &str, now: DateTime<Utc>) -> TaskId {
        loop {
            let id = TaskId::generate(content, now, self.salt);
            self.salt += 1;
            if !self.tasks.contains_key(&id) {
                return id;
            }
        }
    }

    fn validate_content(&self, content: &str) -> Result<(), StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::Validation("content must not be empty".into()));
        }
        let len = content.chars().count();
        if len > self.config.max_content_length {
            return Err(StoreError::Validation(format!(
                "content is {} characters, limit is {}",
                len, self.config.max_content_length
            )));
        }
        Ok(())
    }

    /// Walks `parent`'s ancestor chain and fails if it reaches `task`
    fn check_ancestry(&self, task: &TaskId, parent: &TaskId) -> Result<(), StoreError> {
        let cycle = || StoreError::CircularDependency {
            task: task.clone(),
            parent: parent.clone(),
        };

        let mut current = Some(parent);
        let mut steps = 0;
        while let Some(id) = current {
            if id == task || steps > self.tasks.len() {
                return Err(cycle());
            }
            steps += 1;
            current = self.tasks.get(id).and_then(|t| t.parent_id.as_ref());
        }
        Ok(())
    }

    /// Applies `f` to a task, stamps it and commits a TASK_UPDATED event
    fn modify(&mut self, id: &TaskId, f: impl FnOnce(&mut Task)) -> Result<(), StoreError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::unknown_task(id))?;
        f(task);
        task.touch(Utc::now());

        debug!(task_id = %id, "task updated");
        let event = TaskEvent::TaskUpdated { task: task.clone() };
        self.commit(vec![event])
    }

    fn descendants_post_order(&self, id: &TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<(TaskId, bool)> = match self.tasks.get(id) {
            Some(task) => task.children.iter().rev().map(|c| (c.clone(), false)).collect(),
            None => return out,
        };

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                out.push(node);
                continue;
            }
            if !seen.insert(node.clone()) {
                continue;
            }
            let children: Vec<TaskId> = self
                .tasks
                .get(&node)
                .map(|t| t.children.iter().rev().cloned().collect())
                .unwrap_or_default();
            stack.push((node, true));
            stack.extend(children.into_iter().map(|c| (c, false)));
        }

        out
    }

    /// Removes one task and every link pointing at it
    fn detach_and_remove(&mut self, id: &TaskId) -> Option<Task> {
        let task = self.tasks.remove(id)?;

        if let Some(parent) = task.parent_id.as_ref().and_then(|p| self.tasks.get_mut(p)) {
            parent.children.retain(|c| c != id);
        }
        for milestone in self.milestones.values_mut() {
            milestone.remove_task(id);
        }
        self.order.retain(|o| o != id);

        Some(task)
    }

    fn persist(&self) -> Result<(), StoreError> {
        match &self.snapshot {
            Some(file) => file.write(&self.snapshot()).map_err(StoreError::Persistence),
            None => Ok(()),
        }
    }

    /// Refreshes milestone statuses, persists, then delivers events. A
    /// persistence error wins over a listener error; neither undoes the
    /// mutation.
    fn commit(&mut self, events: Vec<TaskEvent>) -> Result<(), StoreError> {
        for milestone in self.milestones.values_mut() {
            calculate_milestone_status(milestone, self.tasks.values());
        }

        let persisted = self.persist();
        let delivered = self.events.emit_all(&events);

        persisted?;
        delivered.map_err(StoreError::Listener)
    }
}

fn integrity_violations(
    tasks: &HashMap<TaskId, Task>,
    order: &[TaskId],
    milestones: &BTreeMap<MilestoneId, Milestone>,
) -> Vec<String> {
    let mut problems = Vec::new();

    if order.len() != tasks.len() || order.iter().any(|id| !tasks.contains_key(id)) {
        problems.push("task order does not match task table".to_string());
    }

    for (id, task) in tasks {
        if &task.id != id {
            problems.push(format!("task {} is stored under {}", task.id, id));
        }

        if let Some(parent_id) = &task.parent_id {
            match tasks.get(parent_id) {
                Some(parent) if parent.children.contains(id) => {}
                Some(_) => problems.push(format!("{} is missing from children of {}", id, parent_id)),
                None => problems.push(format!("{} has unknown parent {}", id, parent_id)),
            }
        }

        let mut seen = HashSet::new();
        for child_id in &task.children {
            if !seen.insert(child_id) {
                problems.push(format!("{} lists child {} twice", id, child_id));
            }
            match tasks.get(child_id) {
                Some(child) if child.parent_id.as_ref() == Some(id) => {}
                Some(_) => problems.push(format!("child {} does not point back at {}", child_id, id)),
                None => problems.push(format!("{} has unknown child {}", id, child_id)),
            }
        }

        let mut current = task.parent_id.as_ref();
        let mut steps = 0;
        while let Some(ancestor) = current {
            if ancestor == id || steps > tasks.len() {
                problems.push(format!("{} is its own ancestor", id));
                break;
            }
            steps += 1;
            current = tasks.get(ancestor).and_then(|t| t.parent_id.as_ref());
        }

        if let Some(milestone_id) = &task.milestone_id {
            match milestones.get(milestone_id) {
                Some(m) if m.contains(id) => {}
                Some(_) => problems.push(format!("{} is missing from milestone {}", id, milestone_id)),
                None => problems.push(format!("{} has unknown milestone {}", id, milestone_id)),
            }
        }
    }

    for milestone in milestones.values() {
        for member in &milestone.task_ids {
            if !tasks.contains_key(member) {
                problems.push(format!("milestone {} lists unknown task {}", milestone.id, member));
            }
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MilestoneType, Priority};
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn store() -> TaskStore {
        TaskStore::default()
    }

    fn add(store: &mut TaskStore, content: &str) -> TaskId {
        store.add_task(NewTask::new(content, "")).unwrap()
    }

    fn add_child(store: &mut TaskStore, content: &str, parent: &TaskId) -> TaskId {
        store
            .add_task(NewTask::new(content, "").parent(parent.clone()))
            .unwrap()
    }

    fn child_ids(store: &TaskStore, id: &TaskId) -> Vec<TaskId> {
        store.get_task(id).unwrap().children.clone()
    }

    fn record(store: &mut TaskStore, kind: EventKind) -> Rc<RefCell<Vec<TaskEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        store.subscribe(kind, move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        });
        log
    }

    #[test]
    fn add_task_assigns_id_and_defaults() {
        let mut store = store();
        let id = store
            .add_task(NewTask::new("Write docs", "Writing docs").priority(Priority::High))
            .unwrap();

        let task = store.get_task(&id).unwrap();
        assert!(id.as_str().starts_with("t-"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Some(Priority::High));
        assert_eq!(task.metadata.created_at, task.metadata.updated_at);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ids_are_unique_for_identical_content() {
        let mut store = store();
        let a = add(&mut store, "Same");
        let b = add(&mut store, "Same");
        assert_ne!(a, b);
    }

    #[test]
    fn content_length_is_limited() {
        let mut config = StoreConfig::default();
        config.max_content_length = 10;
        let mut store = TaskStore::in_memory(config);

        let result = store.add_task(NewTask::new("x".repeat(11), ""));
        assert!(matches!(result, Err(StoreError::Validation(_))));

        let result = store.add_task(NewTask::new("   ", ""));
        assert!(matches!(result, Err(StoreError::Validation(_))));

        assert!(store.add_task(NewTask::new("x".repeat(10), "")).is_ok());
    }

    #[test]
    fn task_count_ceiling() {
        let mut config = StoreConfig::default();
        config.max_tasks = 2;
        let mut store = TaskStore::in_memory(config);

        add(&mut store, "one");
        add(&mut store, "two");
        let result = store.add_task(NewTask::new("three", ""));
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn dangling_references_rejected() {
        let mut store = store();

        let result = store.add_task(NewTask::new("orphan", "").parent("t-missing".parse().unwrap()));
        assert!(matches!(result, Err(StoreError::InvalidReference { .. })));

        let result =
            store.add_task(NewTask::new("lost", "").milestone(MilestoneId::derive("phase", "1")));
        assert!(matches!(result, Err(StoreError::InvalidReference { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn child_is_linked_both_ways() {
        let mut store = store();
        let root = add(&mut store, "root");
        let child = add_child(&mut store, "child", &root);

        assert_eq!(child_ids(&store, &root), vec![child.clone()]);
        assert_eq!(store.get_task(&child).unwrap().parent_id, Some(root.clone()));
        assert_eq!(store.get_root_tasks().len(), 1);
        assert!(store.integrity_violations().is_empty());
    }

    #[test]
    fn status_change_emits_status_then_update() {
        let mut store = store();
        let id = add(&mut store, "work");

        let order = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventKind::TaskUpdated, EventKind::TaskStatusChanged] {
            let sink = Rc::clone(&order);
            store.subscribe(kind, move |event| {
                sink.borrow_mut().push(event.kind());
                Ok(())
            });
        }

        store.update_task_status(&id, TaskStatus::InProgress).unwrap();

        assert_eq!(
            *order.borrow(),
            vec![EventKind::TaskStatusChanged, EventKind::TaskUpdated]
        );
        let task = store.get_task(&id).unwrap();
        assert!(task.metadata.started_at.is_some());
    }

    #[test]
    fn status_payload_carries_old_and_new() {
        let mut store = store();
        let id = add(&mut store, "work");
        let log = record(&mut store, EventKind::TaskStatusChanged);

        store.update_task_status(&id, TaskStatus::Blocked).unwrap();

        assert_eq!(
            log.borrow()[0],
            TaskEvent::TaskStatusChanged {
                task_id: id.clone(),
                old_status: TaskStatus::Pending,
                new_status: TaskStatus::Blocked,
            }
        );
    }

    #[test]
    fn completion_records_duration() {
        let mut store = store();
        let id = add(&mut store, "work");

        store.update_task_status(&id, TaskStatus::InProgress).unwrap();
        store.update_task_status(&id, TaskStatus::Completed).unwrap();

        let meta = &store.get_task(&id).unwrap().metadata;
        assert!(meta.completed_at.is_some());
        assert!(meta.actual_duration.is_some_and(|d| d >= 0));
    }

    #[test]
    fn unknown_ids_are_invalid_references() {
        let mut store = store();
        let ghost: TaskId = "t-ghost".parse().unwrap();

        assert!(matches!(
            store.update_task_status(&ghost, TaskStatus::Completed),
            Err(StoreError::InvalidReference { .. })
        ));
        assert!(matches!(
            store.update_task_content(&ghost, "x", None),
            Err(StoreError::InvalidReference { .. })
        ));
        assert!(matches!(
            store.remove_task(&ghost, true),
            Err(StoreError::InvalidReference { .. })
        ));
    }

    #[test]
    fn content_update_stamps_and_keeps_active_form() {
        let mut store = store();
        let id = store.add_task(NewTask::new("Old", "Doing old")).unwrap();
        let before = store.get_task(&id).unwrap().metadata.updated_at;

        store.update_task_content(&id, "New", None).unwrap();

        let task = store.get_task(&id).unwrap();
        assert_eq!(task.content, "New");
        assert_eq!(task.active_form, "Doing old");
        assert!(task.metadata.updated_at >= before);

        store
            .update_task_content(&id, "Newer", Some("Doing newer".into()))
            .unwrap();
        assert_eq!(store.get_task(&id).unwrap().active_form, "Doing newer");
    }

    #[test]
    fn cascade_removes_descendants_post_order() {
        let mut store = store();
        let root = add(&mut store, "root");
        let a = add_child(&mut store, "a", &root);
        let a1 = add_child(&mut store, "a1", &a);
        let b = add_child(&mut store, "b", &root);
        let other = add(&mut store, "other");

        let log = record(&mut store, EventKind::TaskRemoved);
        store.remove_task(&root, true).unwrap();

        let removed: Vec<TaskId> = log.borrow().iter().map(|e| e.task_id().clone()).collect();
        assert_eq!(removed, vec![a1, a, b, root]);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&other));
        assert!(store.integrity_violations().is_empty());
    }

    #[test]
    fn removal_without_cascade_reparents_to_grandparent() {
        let mut store = store();
        let g = add(&mut store, "G");
        let before = add_child(&mut store, "before", &g);
        let p = add_child(&mut store, "P", &g);
        let after = add_child(&mut store, "after", &g);
        let c1 = add_child(&mut store, "C1", &p);
        let c2 = add_child(&mut store, "C2", &p);

        store.remove_task(&p, false).unwrap();

        assert!(!store.contains(&p));
        assert_eq!(store.get_task(&c1).unwrap().parent_id, Some(g.clone()));
        assert_eq!(store.get_task(&c2).unwrap().parent_id, Some(g.clone()));
        assert_eq!(child_ids(&store, &g), vec![before, c1, c2, after]);
        assert!(store.integrity_violations().is_empty());
    }

    #[test]
    fn removing_root_without_cascade_promotes_children() {
        let mut store = store();
        let root = add(&mut store, "root");
        let a = add_child(&mut store, "a", &root);
        let b = add_child(&mut store, "b", &root);

        let updates = record(&mut store, EventKind::TaskUpdated);
        store.remove_task(&root, false).unwrap();

        let roots: Vec<TaskId> = store.get_root_tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(roots, vec![a, b]);
        assert_eq!(updates.borrow().len(), 2);
    }

    #[test]
    fn removal_drops_milestone_membership() {
        let mut store = store();
        let id = add(&mut store, "Phase 1: Setup");
        store.sync_milestones(&MilestoneDetector::default()).unwrap();
        let milestone = MilestoneId::derive("phase", "1");
        assert!(store.get_milestone(&milestone).unwrap().contains(&id));

        store.remove_task(&id, false).unwrap();

        assert!(store.get_milestone(&milestone).unwrap().task_ids.is_empty());
    }

    #[test]
    fn move_task_rejects_ancestor_cycles() {
        let mut store = store();
        let a = add(&mut store, "a");
        let b = add_child(&mut store, "b", &a);
        let c = add_child(&mut store, "c", &b);

        assert!(matches!(
            store.move_task(&a, Some(c.clone())),
            Err(StoreError::CircularDependency { .. })
        ));
        assert!(matches!(
            store.move_task(&a, Some(a.clone())),
            Err(StoreError::CircularDependency { .. })
        ));

        store.move_task(&c, None).unwrap();
        assert!(child_ids(&store, &b).is_empty());
        assert!(store.get_task(&c).unwrap().is_root());

        store.move_task(&c, Some(a.clone())).unwrap();
        assert_eq!(child_ids(&store, &a), vec![b, c]);
        assert!(store.integrity_violations().is_empty());
    }

    #[test]
    fn hierarchy_queries() {
        let mut store = store();
        let root = add(&mut store, "root");
        let a = add_child(&mut store, "a", &root);
        let a1 = add_child(&mut store, "a1", &a);
        let b = add_child(&mut store, "b", &root);

        let ids = |tasks: Vec<&Task>| tasks.iter().map(|t| t.id.clone()).collect::<Vec<_>>();

        assert_eq!(ids(store.get_children(&root)), vec![a.clone(), b.clone()]);
        assert_eq!(ids(store.get_descendants(&root)), vec![a.clone(), a1.clone(), b]);
        assert_eq!(ids(store.get_ancestors(&a1)), vec![a, root]);
    }

    #[test]
    fn metadata_updates() {
        let mut store = store();
        let id = add(&mut store, "work");
        let dep = add(&mut store, "first");

        store.add_dependency(&id, dep.clone()).unwrap();
        store.add_dependency(&id, dep.clone()).unwrap();
        store.add_tags(&id, vec!["backend".into(), "backend".into()]).unwrap();
        store.set_notes(&id, Some("see ticket".into())).unwrap();
        store.set_estimated_duration(&id, Some(60_000)).unwrap();
        store.set_priority(&id, Some(Priority::Critical)).unwrap();

        let task = store.get_task(&id).unwrap();
        assert_eq!(task.metadata.dependencies, vec![dep]);
        assert_eq!(task.metadata.tags, vec!["backend".to_string()]);
        assert_eq!(task.metadata.notes.as_deref(), Some("see ticket"));
        assert_eq!(task.metadata.estimated_duration, Some(60_000));
        assert_eq!(task.priority, Some(Priority::Critical));
        assert_eq!(store.tasks_with_tag("backend").len(), 1);

        store.set_dependencies(&id, vec![]).unwrap();
        assert!(store.get_task(&id).unwrap().metadata.dependencies.is_empty());
    }

    #[test]
    fn progress_stats() {
        let mut store = store();
        assert_eq!(store.get_progress_stats().completion_rate, 0.0);

        let a = add(&mut store, "a");
        add(&mut store, "b");
        store.update_task_status(&a, TaskStatus::Completed).unwrap();

        let stats = store.get_progress_stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completion_rate, 0.5);
        assert_eq!(store.tasks_by_status(TaskStatus::Completed).len(), 1);
    }

    #[test]
    fn listener_error_reaches_caller_after_commit() {
        let mut store = store();
        store.subscribe(EventKind::TaskAdded, |_| anyhow::bail!("listener exploded"));

        let result = store.add_task(NewTask::new("survives", ""));

        assert!(matches!(result, Err(StoreError::Listener(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sync_milestones_is_idempotent() {
        let mut store = store();
        let a = add(&mut store, "Phase 1: Setup");
        let detector = MilestoneDetector::default();

        let first = store.sync_milestones(&detector).unwrap();
        assert_eq!(first, vec![MilestoneId::derive("phase", "1")]);

        let b = add(&mut store, "Phase 1: Config");
        let second = store.sync_milestones(&detector).unwrap();
        assert!(second.is_empty());

        let milestone = store.get_milestone(&MilestoneId::derive("phase", "1")).unwrap();
        assert_eq!(milestone.task_ids, vec![a.clone(), b.clone()]);
        assert_eq!(store.get_all_milestones().len(), 1);
        assert_eq!(
            store.get_task(&b).unwrap().milestone_id,
            Some(MilestoneId::derive("phase", "1"))
        );
        assert!(store.integrity_violations().is_empty());
    }

    #[test]
    fn milestone_status_follows_members() {
        let mut store = store();
        let a = add(&mut store, "Sprint 2: api");
        let b = add(&mut store, "Sprint 2: ui");
        store.sync_milestones(&MilestoneDetector::default()).unwrap();
        let id = MilestoneId::derive("sprint", "2");

        store.update_task_status(&a, TaskStatus::InProgress).unwrap();
        assert_eq!(store.get_milestone(&id).unwrap().status, TaskStatus::InProgress);

        store.update_task_status(&a, TaskStatus::Completed).unwrap();
        store.update_task_status(&b, TaskStatus::Completed).unwrap();
        let milestone = store.get_milestone(&id).unwrap();
        assert_eq!(milestone.status, TaskStatus::Completed);
        assert!(milestone.completed_date.is_some());
    }

    #[test]
    fn assign_and_remove_milestones() {
        let mut store = store();
        let id = add(&mut store, "misc");
        let mid = MilestoneId::derive("custom", "beta");

        assert!(matches!(
            store.assign_to_milestone(&id, Some(mid.clone())),
            Err(StoreError::MilestoneNotFound(_))
        ));

        store
            .register_milestone(Milestone::new(mid.clone(), "Beta", MilestoneType::Custom, Priority::Low))
            .unwrap();
        store.assign_to_milestone(&id, Some(mid.clone())).unwrap();
        assert!(store.get_milestone(&mid).unwrap().contains(&id));
        assert!(store.integrity_violations().is_empty());

        let removed = store.remove_milestone(&mid).unwrap();
        assert_eq!(removed.task_ids, vec![id.clone()]);
        assert!(store.contains(&id));
        assert_eq!(store.get_task(&id).unwrap().milestone_id, None);
        assert!(matches!(
            store.remove_milestone(&mid),
            Err(StoreError::MilestoneNotFound(_))
        ));
    }

    #[test]
    fn register_milestone_rejects_unknown_members() {
        let mut store = store();
        let mut milestone = Milestone::new(
            MilestoneId::derive("custom", "x"),
            "X",
            MilestoneType::Custom,
            Priority::Low,
        );
        milestone.add_task("t-nope".parse().unwrap());

        assert!(matches!(
            store.register_milestone(milestone),
            Err(StoreError::InvalidReference { .. })
        ));
    }

    #[test]
    fn import_json_adds_all_or_nothing() {
        let mut store = store();
        let parent = add(&mut store, "parent");

        let payload = format!(
            r#"[{{"content": "one", "activeForm": "Doing one"}},
                {{"content": "two", "parentId": "{}", "status": "blocked"}}]"#,
            parent
        );
        let ids = store.import_json(&payload).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.get_task(&ids[1]).unwrap().status, TaskStatus::Blocked);
        assert_eq!(child_ids(&store, &parent), vec![ids[1].clone()]);

        let malformed = store.import_json(r#"[{"content": 5}]"#);
        assert!(matches!(malformed, Err(StoreError::Validation(_))));

        let bad_entry = store.import_json(r#"[{"content": "ok"}, {"content": ""}]"#);
        assert!(matches!(bad_entry, Err(StoreError::Validation(_))));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn clear_removes_everything() {
        let mut store = store();
        add(&mut store, "Phase 1: a");
        add(&mut store, "b");
        store.sync_milestones(&MilestoneDetector::default()).unwrap();
        let log = record(&mut store, EventKind::TaskRemoved);

        store.clear().unwrap();

        assert!(store.is_empty());
        assert!(store.get_all_milestones().is_empty());
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");

        let mut store = TaskStore::new(StoreConfig::persistent(&path)).unwrap();
        let root = add(&mut store, "Phase 1: Setup");
        add_child(&mut store, "Phase 1: Config", &root);
        store.update_task_status(&root, TaskStatus::InProgress).unwrap();
        store.sync_milestones(&MilestoneDetector::default()).unwrap();
        assert!(path.exists());

        let reloaded = TaskStore::new(StoreConfig::persistent(&path)).unwrap();

        let mut before: Vec<Task> = store.get_all_tasks().into_iter().cloned().collect();
        let mut after: Vec<Task> = reloaded.get_all_tasks().into_iter().cloned().collect();
        assert_eq!(before.len(), 2);
        assert_eq!(before, after);
        before.sort_by(|a, b| a.id.cmp(&b.id));
        after.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(before, after);
        assert_eq!(reloaded.get_all_milestones().len(), 1);
    }

    #[test]
    fn persistence_failure_keeps_mutation() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let mut store = TaskStore::new(StoreConfig::persistent(blocker.join("snapshot.json"))).unwrap();
        let result = store.add_task(NewTask::new("still here", ""));

        assert!(matches!(result, Err(StoreError::Persistence(_))));
        assert_eq!(store.len(), 1);
        assert!(matches!(store.save(), Err(StoreError::Persistence(_))));
    }

    #[test]
    fn in_memory_store_does_not_save() {
        let store = store();
        assert!(!store.save().unwrap());
    }

    #[test]
    fn inconsistent_snapshot_is_rejected() {
        let mut source = store();
        let root = add(&mut source, "root");
        let child = add_child(&mut source, "child", &root);

        let mut snapshot = source.snapshot();
        if let Some(task) = snapshot.tasks.get_mut(&root) {
            task.children.clear();
        }

        let mut target = store();
        let keep = add(&mut target, "keep");
        let result = target.load_snapshot(snapshot);

        assert!(matches!(result, Err(StoreError::Persistence(_))));
        assert!(target.contains(&keep));
        assert!(!target.contains(&child));
    }

    #[test]
    fn dependency_graph_from_store() {
        let mut store = store();
        let a = add(&mut store, "a");
        let b = store
            .add_task(NewTask::new("b", "").depends_on(a.clone()))
            .unwrap();

        let graph = store.dependency_graph();
        assert_eq!(graph.level(&b), Some(1));
        assert_eq!(graph.critical_path(), &[a, b]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Add { parent: Option<usize> },
        Remove { target: usize, cascade: bool },
        Move { target: usize, parent: Option<usize> },
        Status { target: usize, completed: bool },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => any::<Option<usize>>().prop_map(|parent| Op::Add { parent }),
            1 => (any::<usize>(), any::<bool>())
                .prop_map(|(target, cascade)| Op::Remove { target, cascade }),
            2 => (any::<usize>(), any::<Option<usize>>())
                .prop_map(|(target, parent)| Op::Move { target, parent }),
            1 => (any::<usize>(), any::<bool>())
                .prop_map(|(target, completed)| Op::Status { target, completed }),
        ]
    }

    fn pick(store: &TaskStore, n: usize) -> Option<TaskId> {
        let all = store.get_all_tasks();
        if all.is_empty() {
            None
        } else {
            Some(all[n % all.len()].id.clone())
        }
    }

    proptest! {
        #[test]
        fn hierarchy_stays_consistent(ops in proptest::collection::vec(op(), 1..60)) {
            let mut store = TaskStore::default();

            for op in ops {
                // Errors (cycles, unknown ids) are expected; state must hold regardless
                let _ = match op {
                    Op::Add { parent } => {
                        let mut new = NewTask::new("task", "");
                        if let Some(parent) = parent.and_then(|p| pick(&store, p)) {
                            new = new.parent(parent);
                        }
                        store.add_task(new).map(|_| ())
                    }
                    Op::Remove { target, cascade } => match pick(&store, target) {
                        Some(id) => store.remove_task(&id, cascade),
                        None => Ok(()),
                    },
                    Op::Move { target, parent } => match pick(&store, target) {
                        Some(id) => {
                            let parent = parent.and_then(|p| pick(&store, p));
                            store.move_task(&id, parent)
                        }
                        None => Ok(()),
                    },
                    Op::Status { target, completed } => match pick(&store, target) {
                        Some(id) => {
                            let status = if completed { TaskStatus::Completed } else { TaskStatus::InProgress };
                            store.update_task_status(&id, status)
                        }
                        None => Ok(()),
                    },
                };

                prop_assert!(store.integrity_violations().is_empty(), "{:?}", store.integrity_violations());
                for task in store.get_all_tasks() {
                    prop_assert!(store.get_ancestors(&task.id).iter().all(|a| a.id != task.id));
                }
            }
        }
    }
}
