//! Portfolio risk controls shared by every bot run.
//!
//! A [`RiskManager`] composes a [`DrawdownTracker`] and a [`CircuitBreaker`]
//! into a single gate that every BUY/SELL must pass before execution.

pub mod breaker;
pub mod drawdown;
pub mod manager;

pub use breaker::{BreakerStatus, CircuitBreaker};
pub use drawdown::{DrawdownMetrics, DrawdownTracker};
pub use manager::{RiskConfig, RiskDecision, RiskManager, RiskMetrics};
