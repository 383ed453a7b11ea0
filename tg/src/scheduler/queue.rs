//! Pending queue and status snapshot types for the scheduler

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::attempt::AttemptPhase;
use super::task::{QueuedTask, TaskId};

/// Tasks awaiting a free slot, in dispatch order
///
/// Higher priority runs first; within one priority the earlier submission
/// runs first.
pub struct PendingQueue<T> {
    tasks: VecDeque<QueuedTask<T>>,
}

impl<T> PendingQueue<T> {
    pub fn new() -> Self {
        Self { tasks: VecDeque::new() }
    }

    /// Insert a task at its priority position
    ///
    /// Returns the zero-based position the task landed at.
    pub fn push(&mut self, task: QueuedTask<T>) -> usize {
        let position = self
            .tasks
            .iter()
            .position(|queued| queued.priority < task.priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(position, task);
        position
    }

    /// Remove the next task to dispatch
    pub fn pop(&mut self) -> Option<QueuedTask<T>> {
        self.tasks.pop_front()
    }

    /// Remove a specific task, if it is still queued
    pub fn remove(&mut self, id: TaskId) -> Option<QueuedTask<T>> {
        let index = self.tasks.iter().position(|queued| queued.id == id)?;
        self.tasks.remove(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// IDs in dispatch order
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|queued| queued.id).collect()
    }
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_submitted: u64,
    pub total_dispatched: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    pub total_retries: u64,
    pub peak_concurrent: usize,
    pub peak_queue_depth: usize,
}

/// A task currently holding a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTaskInfo {
    pub id: TaskId,
    pub name: String,
    pub priority: i32,
    pub attempt: u32,
    pub phase: AttemptPhase,
    pub started_at: DateTime<Utc>,
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub queued: usize,
    pub running: usize,
    pub max_concurrent_tasks: usize,
    pub active: Vec<ActiveTaskInfo>,
    pub stats: SchedulerStats,
}
