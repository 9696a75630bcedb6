//! Built-in strategy variants.

mod breakout;
mod candle_pattern;
mod ma_cross;
mod macd_cross;
mod mean_reversion;
mod rsi_cross;
mod tradingview;
mod vwap;

pub use breakout::BreakoutStrategy;
pub use candle_pattern::{CandlePatternOscillatorStrategy, Oscillator};
pub use ma_cross::MovingAverageCrossStrategy;
pub use macd_cross::MacdCrossStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use rsi_cross::RsiCrossStrategy;
pub use tradingview::TradingViewStrategy;
pub use vwap::VwapStrategy;

use common::Signal;

fn insufficient_data(need: usize, got: usize) -> Signal {
    Signal::hold(format!("Insufficient data: need {need}, got {got}"))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
