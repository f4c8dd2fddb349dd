//! Store events
//!
//! Listeners subscribe to one [`EventKind`] and run synchronously, in
//! registration order, before the mutating call returns. A listener error
//! stops delivery of that event and reaches the caller, but the mutation
//! has already been applied.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::domain::{Task, TaskId, TaskStatus};

/// Kind of store event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    TaskAdded,
    TaskUpdated,
    TaskStatusChanged,
    TaskRemoved,
}

/// A store event with its payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskEvent {
    TaskAdded {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    #[serde(rename_all = "camelCase")]
    TaskStatusChanged {
        task_id: TaskId,
        old_status: TaskStatus,
        new_status: TaskStatus,
    },
    TaskRemoved {
        task: Task,
    },
}

impl TaskEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TaskEvent::TaskAdded { .. } => EventKind::TaskAdded,
            TaskEvent::TaskUpdated { .. } => EventKind::TaskUpdated,
            TaskEvent::TaskStatusChanged { .. } => EventKind::TaskStatusChanged,
            TaskEvent::TaskRemoved { .. } => EventKind::TaskRemoved,
        }
    }

    /// Returns the ID of the task the event is about
    pub fn task_id(&self) -> &TaskId {
        match self {
            TaskEvent::TaskAdded { task }
            | TaskEvent::TaskUpdated { task }
            | TaskEvent::TaskRemoved { task } => &task.id,
            TaskEvent::TaskStatusChanged { task_id, .. } => task_id,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&TaskEvent) -> anyhow::Result<()>>;

/// Publish/subscribe registry keyed by event kind
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(SubscriptionId, Listener)>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&EventKind, usize> =
            self.listeners.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for one kind of event
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: FnMut(&TaskEvent) -> anyhow::Result<()> + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Removes a listener
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for listeners in self.listeners.values_mut() {
            if let Some(pos) = listeners.iter().position(|(sub, _)| *sub == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    /// Returns the number of listeners for a kind
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Delivers an event to its listeners, stopping at the first error
    pub fn emit(&mut self, event: &TaskEvent) -> anyhow::Result<()> {
        if let Some(listeners) = self.listeners.get_mut(&event.kind()) {
            for (_, listener) in listeners.iter_mut() {
                listener(event)?;
            }
        }
        Ok(())
    }

    /// Delivers events in order, stopping at the first error
    pub fn emit_all(&mut self, events: &[TaskEvent]) -> anyhow::Result<()> {
        for event in events {
            self.emit(event)?;
        }
        Ok(())
    }
}
