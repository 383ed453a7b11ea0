//! Synthetic workload for exercising the scheduler from the command line

use std::time::Duration;

use eyre::{Result, eyre};
use rand::Rng;
use tracing::{debug, info};

use crate::cli::SimulateArgs;
use crate::events::CompletionNotifier;
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerStatus, TaskOptions};

/// What to submit during a simulation
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub tasks: usize,
    pub fail_rate: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    /// Cycled across tasks; empty means every task gets priority 0
    pub priorities: Vec<i32>,
    /// Task indices cancelled before the run starts
    pub cancel: Vec<usize>,
}

impl SimulationPlan {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fail_rate) {
            return Err(eyre!("fail rate must be between 0 and 1, got {}", self.fail_rate));
        }
        if self.min_ms > self.max_ms {
            return Err(eyre!(
                "min duration ({}ms) is larger than max duration ({}ms)",
                self.min_ms,
                self.max_ms
            ));
        }
        Ok(())
    }

    fn priority_for(&self, index: usize) -> i32 {
        if self.priorities.is_empty() {
            0
        } else {
            self.priorities[index % self.priorities.len()]
        }
    }
}

impl From<&SimulateArgs> for SimulationPlan {
    fn from(args: &SimulateArgs) -> Self {
        Self {
            tasks: args.tasks,
            fail_rate: args.fail_rate,
            min_ms: args.min_ms,
            max_ms: args.max_ms,
            priorities: args.priorities.clone(),
            cancel: args.cancel.clone(),
        }
    }
}

/// Apply command-line overrides on top of the configured scheduler defaults
pub fn effective_config(base: &SchedulerConfig, args: &SimulateArgs) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent_tasks: args.concurrency.unwrap_or(base.max_concurrent_tasks),
        retries: args.retries.unwrap_or(base.retries),
        retry_delay_ms: args.retry_delay_ms.unwrap_or(base.retry_delay_ms),
    }
    .normalized()
}

/// Submit the plan, run it to completion and return the final status
///
/// Each successful task yields the milliseconds its last attempt slept.
pub async fn run_simulation(
    config: SchedulerConfig,
    plan: &SimulationPlan,
    notifier: impl CompletionNotifier<u64> + 'static,
) -> Result<SchedulerStatus> {
    debug!(?config, ?plan, "run_simulation: called");
    plan.validate()?;

    let scheduler = Scheduler::new(config, notifier);
    let mut ids = Vec::with_capacity(plan.tasks);

    for index in 0..plan.tasks {
        let (fail_rate, min_ms, max_ms) = (plan.fail_rate, plan.min_ms, plan.max_ms);
        let work = move || {
            let mut rng = rand::rng();
            let ms = rng.random_range(min_ms..=max_ms);
            let fail = rng.random_bool(fail_rate);
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                if fail {
                    Err(eyre!("simulated failure after {ms}ms"))
                } else {
                    Ok(ms)
                }
            }
        };

        let options = TaskOptions::default().priority(plan.priority_for(index));
        ids.push(scheduler.submit(work, format!("job-{index}"), options).await);
    }

    for index in &plan.cancel {
        match ids.get(*index) {
            Some(id) => {
                scheduler.cancel(*id).await;
            }
            None => debug!(index, "run_simulation: cancel index out of range, ignoring"),
        }
    }

    scheduler.run().await;
    scheduler.wait_idle().await;

    let status = scheduler.status().await;
    info!(stats = ?status.stats, "Simulation complete");
    Ok(status)
}
