//! Retry state machine for a dispatched task
//!
//! ```text
//! Running(n) --ok--> Succeeded
//! Running(n) --err, n <= retries--> AwaitingRetry(n) --delay--> Running(n + 1)
//! Running(n) --err, n > retries--> Exhausted
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::error::TaskError;

/// What an active task is doing with its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptPhase {
    Running,
    AwaitingRetry,
}

/// Retry budget for one task, fixed at submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts allowed after the first failure
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Where a dispatched task is in its attempt cycle
#[derive(Debug)]
pub enum AttemptState<T> {
    Running {
        attempt: u32,
    },
    AwaitingRetry {
        attempt: u32,
        /// Retries still available after the upcoming one
        retries_left: u32,
        delay: Duration,
        error: TaskError,
    },
    Succeeded {
        attempts: u32,
        value: T,
    },
    Exhausted {
        attempts: u32,
        error: TaskError,
    },
}

impl<T> AttemptState<T> {
    /// Initial state of a freshly dispatched task
    pub fn start() -> Self {
        Self::Running { attempt: 1 }
    }

    /// Transition out of `Running` once attempt `attempt` has settled
    pub fn settle(attempt: u32, outcome: Result<T, TaskError>, policy: &RetryPolicy) -> Self {
        match outcome {
            Ok(value) => Self::Succeeded {
                attempts: attempt,
                value,
            },
            Err(error) if attempt < policy.max_attempts() => Self::AwaitingRetry {
                attempt,
                retries_left: policy.max_attempts() - attempt - 1,
                delay: policy.delay,
                error,
            },
            Err(error) => Self::Exhausted {
                attempts: attempt,
                error,
            },
        }
    }

    /// State entered once the delay after failed attempt `attempt` has elapsed
    pub fn retry(attempt: u32) -> Self {
        Self::Running { attempt: attempt + 1 }
    }

    /// The attempt this state belongs to (the final count once terminal)
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Running { attempt } | Self::AwaitingRetry { attempt, .. } => *attempt,
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Phase to report in status snapshots, if the task still holds its slot
    pub fn phase(&self) -> Option<AttemptPhase> {
        match self {
            Self::Running { .. } => Some(AttemptPhase::Running),
            Self::AwaitingRetry { .. } => Some(AttemptPhase::AwaitingRetry),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::from_millis(100),
        }
    }

    fn failure() -> Result<u32, TaskError> {
        Err(TaskError::from(eyre::eyre!("nope")))
    }

    #[test]
    fn test_success_releases_slot() {
        let state = AttemptState::settle(1, Ok(9u32), &policy(3));
        assert!(matches!(state, AttemptState::Succeeded { attempts: 1, value: 9 }));
        assert_eq!(state.phase(), None);
        assert_eq!(state.attempt(), 1);
    }

    #[test]
    fn test_failure_with_budget_awaits_retry() {
        let state = AttemptState::settle(1, failure(), &policy(2));
        match &state {
            AttemptState::AwaitingRetry {
                attempt,
                retries_left,
                delay,
                ..
            } => {
                assert_eq!(*attempt, 1);
                assert_eq!(*retries_left, 1);
                assert_eq!(*delay, Duration::from_millis(100));
            }
            other => panic!("Expected AwaitingRetry, got {other:?}"),
        }
        assert_eq!(state.phase(), Some(AttemptPhase::AwaitingRetry));
        assert_eq!(state.attempt(), 1);

        let next = AttemptState::<u32>::retry(1);
        assert!(matches!(next, AttemptState::Running { attempt: 2 }));
        assert_eq!(next.phase(), Some(AttemptPhase::Running));
        assert_eq!(next.attempt(), 2);
    }

    #[test]
    fn test_two_retries_allow_three_attempts() {
        let policy = policy(2);
        let mut state: AttemptState<u32> = AttemptState::start();
        let mut invocations = 0;

        while let AttemptState::Running { attempt } = state {
            invocations += 1;
            state = match AttemptState::settle(attempt, failure(), &policy) {
                AttemptState::AwaitingRetry { attempt, .. } => AttemptState::retry(attempt),
                settled => settled,
            };
        }

        assert_eq!(invocations, 3);
        assert!(matches!(state, AttemptState::Exhausted { attempts: 3, .. }));
    }

    #[test]
    fn test_zero_retries_exhausts_immediately() {
        let state = AttemptState::settle(1, failure(), &policy(0));
        assert!(matches!(state, AttemptState::Exhausted { attempts: 1, .. }));
        assert_eq!(state.phase(), None);
    }

    #[test]
    fn test_max_attempts_saturates() {
        assert_eq!(policy(u32::MAX).max_attempts(), u32::MAX);
    }
}
