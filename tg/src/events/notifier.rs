//! Notifier seams between the scheduler and its host
//!
//! The scheduler never interprets task results itself; it hands every
//! lifecycle transition to a `CompletionNotifier` and every exhausted task to
//! an `ErrorNotifier`. Plain closures implement both traits.

use super::types::TaskEvent;
use crate::error::TaskError;
use crate::scheduler::TaskId;

/// Receives every lifecycle event of every task
pub trait CompletionNotifier<T>: Send + Sync {
    fn notify(&self, event: TaskEvent<T>);
}

impl<T, F> CompletionNotifier<T> for F
where
    F: Fn(TaskEvent<T>) + Send + Sync,
{
    fn notify(&self, event: TaskEvent<T>) {
        self(event)
    }
}

/// Receives the final error of a task that exhausted its retries
///
/// Called exactly once per exhausted task, before its `Failed` event.
pub trait ErrorNotifier: Send + Sync {
    fn notify_error(&self, id: TaskId, name: &str, error: &TaskError);
}

impl<F> ErrorNotifier for F
where
    F: Fn(TaskId, &str, &TaskError) + Send + Sync,
{
    fn notify_error(&self, id: TaskId, name: &str, error: &TaskError) {
        self(id, name, error)
    }
}

/// Error notifier that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopErrorNotifier;

impl ErrorNotifier for NoopErrorNotifier {
    fn notify_error(&self, _id: TaskId, _name: &str, _error: &TaskError) {}
}
