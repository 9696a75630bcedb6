pub mod config;
pub mod indicators;
pub mod registry;
pub mod strategies;

pub use config::{BotConfig, BotFileConfig};
pub use registry::{StrategyEntry, StrategyRegistry};

use common::{CandleWindow, Signal, SignalKind, StrategyContext};

/// All strategy implementations must satisfy this trait.
///
/// One instance serves one (bot, symbol) pair; the only mutable state an
/// implementation keeps is the last directional signal it emitted.
pub trait Strategy: Send {
    /// Registry name of this strategy (e.g. "RSI_CROSS").
    fn name(&self) -> &str;

    /// Evaluate the trailing candle window and return a signal.
    ///
    /// Never fails: short windows and undefined indicators produce `HOLD`
    /// with a `reason` in the signal meta.
    fn evaluate(&mut self, window: &CandleWindow, ctx: &StrategyContext) -> Signal;

    /// Last directional signal emitted, `Hold` before the first one.
    fn last_signal(&self) -> SignalKind;
}
