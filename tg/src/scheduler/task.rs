//! Task identity and the work a task runs

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Opaque task identifier, unique for the lifetime of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw counter value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Monotonic source of task IDs; never hands out the same value twice
#[derive(Debug)]
pub(crate) struct TaskIdGenerator {
    next: AtomicU64,
}

impl TaskIdGenerator {
    pub(crate) fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub(crate) fn next_id(&self) -> TaskId {
        TaskId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Future returned by one attempt of a task
pub type TaskFuture<T> = BoxFuture<'static, eyre::Result<T>>;

/// Zero-argument unit of work, invoked once per attempt
///
/// Implemented for any `Fn() -> impl Future<Output = eyre::Result<T>>`, so
/// closures returning async blocks can be submitted directly.
pub trait Work<T>: Send + Sync {
    fn call(&self) -> TaskFuture<T>;
}

impl<T, F, Fut> Work<T> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = eyre::Result<T>> + Send + 'static,
{
    fn call(&self) -> TaskFuture<T> {
        Box::pin(self())
    }
}

/// A submitted task waiting in, or dispatched from, the pending queue
pub struct QueuedTask<T> {
    pub id: TaskId,
    pub name: String,
    pub priority: i32,
    pub retries: u32,
    pub retry_delay: Duration,
    pub work: Arc<dyn Work<T>>,
}

impl<T> fmt::Debug for QueuedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}
