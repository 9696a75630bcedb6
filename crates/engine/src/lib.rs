//! Bot execution: per-bot runner loop, trade execution, supervision and
//! event recording.

pub mod executor;
pub mod lifecycle;
pub mod metrics;
pub mod retry;
pub mod runner;

pub use executor::{PositionBook, TradeExecutor};
pub use lifecycle::{Supervisor, SupervisorCommand, SupervisorHandle};
pub use metrics::{EventRecorder, MetricsSnapshot};
pub use retry::RetryPolicy;
pub use runner::{BotRunner, BotServices, RunnerConfig};
