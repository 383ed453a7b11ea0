//! Task lifecycle events
//!
//! - [`TaskEvent`] - tagged lifecycle event for a single task
//! - [`CompletionNotifier`] / [`ErrorNotifier`] - callback seams the scheduler reports through
//! - [`EventBus`] - broadcast notifier for multiple subscribers

mod bus;
mod notifier;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use notifier::{CompletionNotifier, ErrorNotifier, NoopErrorNotifier};
pub use types::TaskEvent;
