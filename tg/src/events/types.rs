//! Event types for task lifecycle reporting
//!
//! Every submitted task produces a `Loading` event immediately, zero or more
//! `Running`/`Retrying` events while it occupies a slot, and exactly one
//! terminal event (`Succeeded`, `Failed` or `Cancelled`).

use std::time::Duration;

use crate::error::TaskError;
use crate::scheduler::TaskId;

/// Lifecycle event for a single task
#[derive(Clone, Debug)]
pub enum TaskEvent<T> {
    /// Task was accepted and is waiting for a slot
    Loading { id: TaskId, name: String },
    /// An attempt has started (attempt numbers start at 1)
    Running { id: TaskId, name: String, attempt: u32 },
    /// An attempt failed and the task will run again after `delay`
    Retrying {
        id: TaskId,
        name: String,
        attempt: u32,
        retries_left: u32,
        delay: Duration,
        error: TaskError,
    },
    /// The task produced a value
    Succeeded { id: TaskId, name: String, value: T },
    /// The task failed on every allowed attempt
    Failed {
        id: TaskId,
        name: String,
        attempts: u32,
        error: TaskError,
    },
    /// The task was removed from the queue before it ran
    Cancelled { id: TaskId, name: String },
}

impl<T> TaskEvent<T> {
    /// Get the task ID for this event
    pub fn id(&self) -> TaskId {
        match self {
            TaskEvent::Loading { id, .. }
            | TaskEvent::Running { id, .. }
            | TaskEvent::Retrying { id, .. }
            | TaskEvent::Succeeded { id, .. }
            | TaskEvent::Failed { id, .. }
            | TaskEvent::Cancelled { id, .. } => *id,
        }
    }

    /// Get the task name for this event
    pub fn name(&self) -> &str {
        match self {
            TaskEvent::Loading { name, .. }
            | TaskEvent::Running { name, .. }
            | TaskEvent::Retrying { name, .. }
            | TaskEvent::Succeeded { name, .. }
            | TaskEvent::Failed { name, .. }
            | TaskEvent::Cancelled { name, .. } => name,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::Loading { .. } => "Loading",
            TaskEvent::Running { .. } => "Running",
            TaskEvent::Retrying { .. } => "Retrying",
            TaskEvent::Succeeded { .. } => "Succeeded",
            TaskEvent::Failed { .. } => "Failed",
            TaskEvent::Cancelled { .. } => "Cancelled",
        }
    }

    /// True for the final event a task will ever produce
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::Succeeded { .. } | TaskEvent::Failed { .. } | TaskEvent::Cancelled { .. }
        )
    }

    /// True while the task has not reached a terminal state
    pub fn is_loading(&self) -> bool {
        !self.is_terminal()
    }
}
