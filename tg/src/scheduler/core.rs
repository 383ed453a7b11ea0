//! Scheduler implementation

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::error::TaskError;
use crate::events::{CompletionNotifier, ErrorNotifier, NoopErrorNotifier, TaskEvent};

use super::attempt::{AttemptPhase, AttemptState, RetryPolicy};
use super::config::{ConfigUpdate, SchedulerConfig, TaskOptions};
use super::queue::{ActiveTaskInfo, PendingQueue, SchedulerStats, SchedulerStatus};
use super::task::{QueuedTask, TaskId, TaskIdGenerator, Work};

/// Bookkeeping for a task that holds a slot
struct ActiveTask {
    name: String,
    priority: i32,
    attempt: u32,
    phase: AttemptPhase,
    started_at: DateTime<Utc>,
}

/// Internal state protected by mutex
struct SchedulerInner<T> {
    config: SchedulerConfig,

    /// Tasks waiting for a slot
    queue: PendingQueue<T>,

    /// Tasks holding a slot, running or waiting out a retry delay
    active: HashMap<TaskId, ActiveTask>,

    /// Set by the first `run`; completions and reconfiguration only dispatch after it
    started: bool,

    stats: SchedulerStats,
}

impl<T> SchedulerInner<T> {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active.is_empty()
    }
}

/// How a dispatched task gave its slot back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Succeeded,
    Failed,
    /// The driver itself panicked (e.g. inside a notifier)
    Aborted,
}

struct Shared<T> {
    inner: Mutex<SchedulerInner<T>>,
    notifier: Box<dyn CompletionNotifier<T>>,
    error_notifier: Box<dyn ErrorNotifier>,
    ids: TaskIdGenerator,
    /// Woken whenever a task leaves the scheduler
    idle: Notify,
}

/// The Scheduler runs submitted work with a hard cap on concurrency,
/// priority ordering, per-task retries and cancellation of queued tasks.
///
/// Cloning yields another handle to the same scheduler.
pub struct Scheduler<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Scheduler<T> {
    /// Create a new scheduler that reports lifecycle events to `notifier`
    pub fn new(config: SchedulerConfig, notifier: impl CompletionNotifier<T> + 'static) -> Self {
        Self::with_notifiers(config, notifier, NoopErrorNotifier)
    }

    /// Create a new scheduler with an explicit notifier for exhausted tasks
    pub fn with_notifiers(
        config: SchedulerConfig,
        notifier: impl CompletionNotifier<T> + 'static,
        error_notifier: impl ErrorNotifier + 'static,
    ) -> Self {
        let config = config.normalized();
        debug!(?config, "Scheduler::new: called");
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(SchedulerInner {
                    config,
                    queue: PendingQueue::new(),
                    active: HashMap::new(),
                    started: false,
                    stats: SchedulerStats::default(),
                }),
                notifier: Box::new(notifier),
                error_notifier: Box::new(error_notifier),
                ids: TaskIdGenerator::new(),
                idle: Notify::new(),
            }),
        }
    }

    /// Queue a task and return its ID
    ///
    /// Emits `TaskEvent::Loading` before the task is queued. Nothing runs
    /// until `run` is called (or an earlier task frees a slot).
    pub async fn submit<W>(&self, work: W, name: impl Into<String>, options: TaskOptions) -> TaskId
    where
        W: Work<T> + 'static,
    {
        let name = name.into();
        let id = self.shared.ids.next_id();
        debug!(%id, %name, priority = options.priority, "Scheduler::submit: called");

        self.shared.notifier.notify(TaskEvent::Loading { id, name: name.clone() });

        let mut inner = self.shared.inner.lock().await;
        let task = QueuedTask {
            id,
            name,
            priority: options.priority,
            retries: options.retries.unwrap_or(inner.config.retries),
            retry_delay: options.retry_delay.unwrap_or_else(|| inner.config.retry_delay()),
            work: Arc::new(work),
        };

        let position = inner.queue.push(task);
        inner.stats.total_submitted += 1;
        inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.queue.len());

        debug!(%id, position, queued = inner.queue.len(), "Scheduler::submit: queued");
        id
    }

    /// Cancel a queued task
    ///
    /// Returns false, without side effects, if the task is running, waiting
    /// to retry, finished, or unknown.
    pub async fn cancel(&self, id: TaskId) -> bool {
        debug!(%id, "Scheduler::cancel: called");
        let mut inner = self.shared.inner.lock().await;

        if inner.active.contains_key(&id) {
            debug!(%id, "Scheduler::cancel: is active, cannot cancel");
            return false;
        }

        let Some(task) = inner.queue.remove(id) else {
            debug!(%id, "Scheduler::cancel: not found in queue");
            return false;
        };
        inner.stats.total_cancelled += 1;
        drop(inner);

        info!(%id, name = %task.name, "Task cancelled");
        self.shared.notifier.notify(TaskEvent::Cancelled { id, name: task.name });
        self.shared.idle.notify_waiters();
        true
    }

    /// Start draining the queue
    ///
    /// Fills every free slot and returns; remaining tasks are dispatched in
    /// the background as slots free up. Safe to call repeatedly.
    pub async fn run(&self) {
        debug!("Scheduler::run: called");
        let mut inner = self.shared.inner.lock().await;
        if !inner.started {
            info!(max_concurrent_tasks = inner.config.max_concurrent_tasks, "Scheduler started");
        }
        inner.started = true;
        Shared::dispatch(&self.shared, &mut inner);
    }

    /// Wait until nothing is queued or active
    ///
    /// Does not start the scheduler: with queued tasks and no `run`, this
    /// waits until they are cancelled.
    pub async fn wait_idle(&self) {
        debug!("Scheduler::wait_idle: called");
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.inner.lock().await.is_idle() {
                debug!("Scheduler::wait_idle: idle");
                return;
            }
            notified.await;
        }
    }

    /// Update the ceiling and the retry defaults for future tasks
    ///
    /// Active tasks are never stopped, even if the new ceiling is lower than
    /// the number running. Once started, a raised ceiling is filled at once.
    pub async fn configure(&self, update: ConfigUpdate) {
        debug!(?update, "Scheduler::configure: called");
        let mut inner = self.shared.inner.lock().await;
        inner.config.apply(&update);
        info!(config = ?inner.config, "Scheduler reconfigured");

        if inner.started {
            debug!("Scheduler::configure: started, re-running dispatch");
            Shared::dispatch(&self.shared, &mut inner);
        }
    }

    /// Get a point-in-time snapshot of the scheduler
    pub async fn status(&self) -> SchedulerStatus {
        debug!("Scheduler::status: called");
        let inner = self.shared.inner.lock().await;

        let mut active: Vec<_> = inner
            .active
            .iter()
            .map(|(id, task)| ActiveTaskInfo {
                id: *id,
                name: task.name.clone(),
                priority: task.priority,
                attempt: task.attempt,
                phase: task.phase,
                started_at: task.started_at,
            })
            .collect();
        active.sort_by_key(|task| task.id);

        SchedulerStatus {
            queued: inner.queue.len(),
            running: inner.active.len(),
            max_concurrent_tasks: inner.config.max_concurrent_tasks,
            active,
            stats: inner.stats.clone(),
        }
    }

    /// IDs of queued tasks in the order they will be dispatched
    pub async fn pending_ids(&self) -> Vec<TaskId> {
        self.shared.inner.lock().await.queue.ids()
    }

    /// Get the scheduler statistics
    pub async fn stats(&self) -> SchedulerStats {
        self.shared.inner.lock().await.stats.clone()
    }

    /// Get the current configuration
    pub async fn config(&self) -> SchedulerConfig {
        self.shared.inner.lock().await.config.clone()
    }
}

impl<T: Send + 'static> Shared<T> {
    /// Move queued tasks into free slots and spawn their drivers
    fn dispatch(shared: &Arc<Self>, inner: &mut SchedulerInner<T>) {
        while inner.active.len() < inner.config.max_concurrent_tasks {
            let Some(task) = inner.queue.pop() else {
                break;
            };
            debug!(id = %task.id, name = %task.name, priority = task.priority, "Scheduler::dispatch: promoting from queue");

            inner.active.insert(
                task.id,
                ActiveTask {
                    name: task.name.clone(),
                    priority: task.priority,
                    attempt: 1,
                    phase: AttemptPhase::Running,
                    started_at: Utc::now(),
                },
            );
            inner.stats.total_dispatched += 1;
            inner.stats.peak_concurrent = inner.stats.peak_concurrent.max(inner.active.len());

            tokio::spawn(Self::run_task(Arc::clone(shared), task));
        }
    }

    /// Drive one task to completion, then release its slot no matter what
    async fn run_task(shared: Arc<Self>, task: QueuedTask<T>) {
        let id = task.id;
        let settlement = match AssertUnwindSafe(Self::drive(&shared, task)).catch_unwind().await {
            Ok(settlement) => settlement,
            Err(payload) => {
                let err = TaskError::from_panic(payload);
                error!(%id, error = %err, "Task driver panicked, releasing slot");
                Settlement::Aborted
            }
        };
        Self::finish(&shared, id, settlement).await;
    }

    async fn drive(shared: &Arc<Self>, task: QueuedTask<T>) -> Settlement {
        let QueuedTask {
            id,
            name,
            retries,
            retry_delay,
            work,
            ..
        } = task;
        let policy = RetryPolicy {
            retries,
            delay: retry_delay,
        };

        let mut state = AttemptState::start();
        loop {
            if let Some(phase) = state.phase() {
                let attempt = state.attempt();
                shared.mark(id, attempt, phase).await;
            }

            state = match state {
                AttemptState::Running { attempt } => {
                    debug!(%id, %name, attempt, "Scheduler::drive: attempt started");
                    shared.notifier.notify(TaskEvent::Running {
                        id,
                        name: name.clone(),
                        attempt,
                    });

                    let outcome = invoke(work.as_ref()).await;
                    AttemptState::settle(attempt, outcome, &policy)
                }
                AttemptState::AwaitingRetry {
                    attempt,
                    retries_left,
                    delay,
                    error,
                } => {
                    warn!(%id, %name, attempt, retries_left, ?delay, %error, "Task attempt failed, retrying");
                    shared.notifier.notify(TaskEvent::Retrying {
                        id,
                        name: name.clone(),
                        attempt,
                        retries_left,
                        delay,
                        error,
                    });

                    // The slot stays occupied for the whole delay
                    tokio::time::sleep(delay).await;
                    AttemptState::retry(attempt)
                }
                AttemptState::Succeeded { attempts, value } => {
                    info!(%id, %name, attempts, "Task succeeded");
                    shared.notifier.notify(TaskEvent::Succeeded { id, name, value });
                    return Settlement::Succeeded;
                }
                AttemptState::Exhausted { attempts, error } => {
                    warn!(%id, %name, attempts, %error, "Task failed, retries exhausted");
                    shared.error_notifier.notify_error(id, &name, &error);
                    shared.notifier.notify(TaskEvent::Failed {
                        id,
                        name,
                        attempts,
                        error,
                    });
                    return Settlement::Failed;
                }
            };
        }
    }

    /// Record the attempt a task is on
    async fn mark(&self, id: TaskId, attempt: u32, phase: AttemptPhase) {
        let mut inner = self.inner.lock().await;
        if phase == AttemptPhase::AwaitingRetry {
            inner.stats.total_retries += 1;
        }
        if let Some(task) = inner.active.get_mut(&id) {
            task.attempt = attempt;
            task.phase = phase;
        }
    }

    /// Release a slot and hand it to the next queued task
    async fn finish(shared: &Arc<Self>, id: TaskId, settlement: Settlement) {
        debug!(%id, ?settlement, "Scheduler::finish: called");
        let mut inner = shared.inner.lock().await;

        if inner.active.remove(&id).is_none() {
            warn!(%id, "Scheduler::finish: task was not active");
        }
        match settlement {
            Settlement::Succeeded => inner.stats.total_succeeded += 1,
            Settlement::Failed | Settlement::Aborted => inner.stats.total_failed += 1,
        }

        Self::dispatch(shared, &mut inner);
        drop(inner);

        shared.idle.notify_waiters();
    }
}

/// Run one attempt, turning errors and panics into `TaskError`
async fn invoke<T>(work: &dyn Work<T>) -> Result<T, TaskError> {
    match AssertUnwindSafe(async { work.call().await }).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(report)) => Err(TaskError::from(report)),
        Err(payload) => Err(TaskError::from_panic(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    type Log = Arc<StdMutex<Vec<(TaskId, &'static str)>>>;

    fn recording_scheduler(max_concurrent_tasks: usize) -> (Scheduler<u32>, Log) {
        let log: Log = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let scheduler = Scheduler::new(
            SchedulerConfig {
                max_concurrent_tasks,
                retries: 0,
                retry_delay_ms: 1,
            },
            move |event: TaskEvent<u32>| sink.lock().unwrap().push((event.id(), event.event_type())),
        );
        (scheduler, log)
    }

    fn sleepy(ms: u64) -> impl Fn() -> futures::future::BoxFuture<'static, eyre::Result<u32>> + Send + Sync {
        move || {
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                eyre::Ok(1)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_limit() {
        let (scheduler, _log) = recording_scheduler(2);

        scheduler.submit(sleepy(50), "a", TaskOptions::default()).await;
        scheduler.submit(sleepy(50), "b", TaskOptions::default()).await;
        scheduler.submit(sleepy(50), "c", TaskOptions::default()).await;

        scheduler.run().await;

        let status = scheduler.status().await;
        assert_eq!(status.running, 2);
        assert_eq!(status.queued, 1);
        assert_eq!(status.max_concurrent_tasks, 2);

        scheduler.wait_idle().await;
        let status = scheduler.status().await;
        assert_eq!(status.running, 0);
        assert_eq!(status.queued, 0);
    }

    #[tokio::test]
    async fn test_priority_ordering() {
        let (scheduler, log) = recording_scheduler(1);

        let low = scheduler.submit(sleepy(1), "low", TaskOptions::default().priority(-1)).await;
        let normal = scheduler.submit(sleepy(1), "normal", TaskOptions::default()).await;
        let high = scheduler.submit(sleepy(1), "high", TaskOptions::default().priority(5)).await;

        assert_eq!(scheduler.pending_ids().await, vec![high, normal, low]);

        scheduler.run().await;
        scheduler.wait_idle().await;

        let started: Vec<_> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, kind)| *kind == "Running")
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(started, vec![high, normal, low]);
    }

    #[tokio::test]
    async fn test_cancel() {
        let (scheduler, log) = recording_scheduler(1);

        let running = scheduler.submit(sleepy(30), "running", TaskOptions::default()).await;
        let queued = scheduler.submit(sleepy(30), "queued", TaskOptions::default()).await;
        scheduler.run().await;

        // Cancel the queued one
        assert!(scheduler.cancel(queued).await);

        // Running and unknown tasks can't be cancelled
        assert!(!scheduler.cancel(running).await);
        assert!(!scheduler.cancel(TaskId::from_raw(999)).await);

        scheduler.wait_idle().await;

        let events = log.lock().unwrap();
        assert!(events.contains(&(queued, "Cancelled")));
        assert!(!events.contains(&(queued, "Running")));
        assert!(events.contains(&(running, "Succeeded")));
    }

    #[tokio::test]
    async fn test_stats_tracking() {
        let (scheduler, _log) = recording_scheduler(2);

        scheduler.submit(sleepy(5), "a", TaskOptions::default()).await;
        scheduler.submit(sleepy(5), "b", TaskOptions::default()).await;
        scheduler
            .submit(
                || async { Err::<u32, _>(eyre::eyre!("always fails")) },
                "c",
                TaskOptions::default().retries(1),
            )
            .await;

        scheduler.run().await;
        scheduler.wait_idle().await;

        let stats = scheduler.stats().await;
        assert_eq!(stats.total_submitted, 3);
        assert_eq!(stats.total_dispatched, 3);
        assert_eq!(stats.total_succeeded, 2);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.total_retries, 1);
        assert_eq!(stats.peak_concurrent, 2);
        assert_eq!(stats.peak_queue_depth, 3);
    }

    #[tokio::test]
    async fn test_retry_phase_visible_in_status() {
        let (scheduler, _log) = recording_scheduler(1);

        let id = scheduler
            .submit(
                || async { Err::<u32, _>(eyre::eyre!("flaky")) },
                "flaky",
                TaskOptions::default().retries(1).retry_delay(Duration::from_millis(200)),
            )
            .await;
        scheduler.run().await;

        // Let the first attempt fail and enter its retry delay
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status = scheduler.status().await;
        assert_eq!(status.running, 1);
        assert_eq!(status.active[0].id, id);
        assert_eq!(status.active[0].phase, AttemptPhase::AwaitingRetry);
        assert_eq!(status.active[0].attempt, 1);

        scheduler.wait_idle().await;
    }

    #[tokio::test]
    async fn test_status_follows_attempt_after_retry() {
        let (scheduler, _log) = recording_scheduler(1);
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let id = {
            let gate = Arc::clone(&gate);
            let calls = Arc::clone(&calls);
            scheduler
                .submit(
                    move || {
                        let gate = Arc::clone(&gate);
                        let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                        async move {
                            if n == 1 {
                                return Err(eyre::eyre!("first attempt fails"));
                            }
                            gate.acquire().await?.forget();
                            Ok(n)
                        }
                    },
                    "second-try",
                    TaskOptions::default().retries(1).retry_delay(Duration::from_millis(5)),
                )
                .await
        };
        scheduler.run().await;

        // Past the retry delay, the second attempt is parked on the gate
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status = scheduler.status().await;
        assert_eq!(status.active[0].id, id);
        assert_eq!(status.active[0].attempt, 2);
        assert_eq!(status.active[0].phase, AttemptPhase::Running);
        assert_eq!(status.stats.total_retries, 1);

        gate.add_permits(1);
        scheduler.wait_idle().await;
        assert_eq!(scheduler.stats().await.total_succeeded, 1);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_when_empty() {
        let (scheduler, _log) = recording_scheduler(1);
        tokio::time::timeout(Duration::from_secs(1), scheduler.wait_idle())
            .await
            .expect("idle scheduler should not block");
    }
}
