//! Bounded-concurrency task scheduler
//!
//! Runs submitted work with a hard cap on simultaneous tasks, priority
//! queuing, per-task retry with delay, and cancellation of queued tasks.

mod attempt;
mod config;
mod core;
mod queue;
mod task;

pub use attempt::{AttemptPhase, AttemptState, RetryPolicy};
pub use config::{
    ConfigUpdate, DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, SchedulerConfig, TaskOptions,
};
pub use self::core::Scheduler;
pub use queue::{ActiveTaskInfo, PendingQueue, SchedulerStats, SchedulerStatus};
pub use task::{QueuedTask, TaskFuture, TaskId, Work};
