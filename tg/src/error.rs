//! Task error types

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Why a single attempt of a task failed
///
/// Cloneable so the same failure can be handed to the error notifier and
/// carried in the terminal event.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The work returned an error
    #[error("{0}")]
    Failed(Arc<eyre::Report>),

    /// The work panicked while running
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Build a `Panicked` error from a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

impl From<eyre::Report> for TaskError {
    fn from(report: eyre::Report) -> Self {
        Self::Failed(Arc::new(report))
    }
}
