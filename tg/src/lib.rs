//! TaskGate - bounded-concurrency task scheduler
//!
//! Callers submit asynchronous work; TaskGate runs it with a hard cap on
//! how many tasks execute at once, ordered by priority, retrying failures
//! after a delay while holding the task's slot, and reporting every
//! lifecycle transition through a notifier.
//!
//! # Modules
//!
//! - [`scheduler`] - the scheduler, its queue and retry state machine
//! - [`events`] - lifecycle events and the notifier seams
//! - [`error`] - task error type
//! - [`config`] - configuration file loading
//! - [`cli`] - command-line interface for the `tg` binary
//! - [`simulate`] - synthetic workload driven by `tg simulate`

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod simulate;

// Re-export commonly used types
pub use config::Config;
pub use error::TaskError;
pub use events::{CompletionNotifier, ErrorNotifier, EventBus, NoopErrorNotifier, TaskEvent};
pub use scheduler::{
    ActiveTaskInfo, AttemptPhase, ConfigUpdate, Scheduler, SchedulerConfig, SchedulerStats, SchedulerStatus, TaskId,
    TaskOptions, Work,
};
