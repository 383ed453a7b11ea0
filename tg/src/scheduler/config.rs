//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Concurrency ceiling used when none (or zero) is configured
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 3;

/// Retries per task when the task does not override it
pub const DEFAULT_RETRIES: u32 = 10;

/// Delay between attempts when the task does not override it
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max tasks occupying a slot at once
    #[serde(rename = "max-concurrent-tasks", default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Default retries for new tasks
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Default delay between attempts in milliseconds
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_concurrent_tasks() -> usize {
    DEFAULT_MAX_CONCURRENT_TASKS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            retries: DEFAULT_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl SchedulerConfig {
    /// Create a config with the given ceiling and default retry policy
    pub fn with_max_concurrent_tasks(max_concurrent_tasks: usize) -> Self {
        Self {
            max_concurrent_tasks,
            ..Default::default()
        }
        .normalized()
    }

    /// Get the default retry delay as a Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Replace an unusable ceiling with the default
    pub fn normalized(mut self) -> Self {
        self.max_concurrent_tasks = normalize_max_concurrent(self.max_concurrent_tasks);
        self
    }

    /// Apply a partial update, normalizing the ceiling the same way as construction
    ///
    /// The default retry delay is stored in whole milliseconds: sub-millisecond
    /// parts of `retry_delay` are dropped and delays past `u64::MAX` ms saturate.
    /// Per-task `TaskOptions::retry_delay` keeps full precision.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(max) = update.max_concurrent_tasks {
            self.max_concurrent_tasks = normalize_max_concurrent(max);
        }
        if let Some(retries) = update.retries {
            self.retries = retries;
        }
        if let Some(delay) = update.retry_delay {
            self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        }
    }
}

fn normalize_max_concurrent(max: usize) -> usize {
    if max == 0 {
        warn!(
            default = DEFAULT_MAX_CONCURRENT_TASKS,
            "max_concurrent_tasks must be at least 1, using default"
        );
        DEFAULT_MAX_CONCURRENT_TASKS
    } else {
        max
    }
}

/// Partial reconfiguration of a running scheduler
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub max_concurrent_tasks: Option<usize>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl ConfigUpdate {
    pub fn max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = Some(max);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }
}

/// Per-task overrides supplied at submission
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Higher runs earlier; 0 is the default tier
    pub priority: i32,

    /// Overrides the scheduler's default retries
    pub retries: Option<u32>,

    /// Overrides the scheduler's default retry delay
    pub retry_delay: Option<Duration>,
}

impl TaskOptions {
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }
}
