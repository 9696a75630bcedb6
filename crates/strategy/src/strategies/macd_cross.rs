use common::{CandleWindow, Signal, SignalKind, StrategyContext, StrategyParams};

use super::{insufficient_data, round_to};
use crate::indicators::{MacdIndicator, MacdSignal};
use crate::Strategy;

/// MACD line crossing its signal line.
#[derive(Debug, Clone)]
pub struct MacdCrossStrategy {
    indicator: MacdIndicator,
    last_signal: SignalKind,
}

impl MacdCrossStrategy {
    pub const NAME: &'static str = "MACD_CROSS";

    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            indicator: MacdIndicator::new(fast, slow, signal),
            last_signal: SignalKind::Hold,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(
            params.usize("fast_period", 12),
            params.usize("slow_period", 26),
            params.usize("signal_period", 9),
        )
    }
}

impl Default for MacdCrossStrategy {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Strategy for MacdCrossStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, window: &CandleWindow, _ctx: &StrategyContext) -> Signal {
        let ind = &self.indicator;
        if !ind.is_valid() {
            return Signal::hold(format!(
                "Invalid MACD periods: fast={} slow={} signal={}",
                ind.fast, ind.slow, ind.signal
            ));
        }

        let closes = window.closes();
        let need = ind.min_len() + 5;
        if closes.len() < need {
            return insufficient_data(need, closes.len());
        }

        let Some(reading) = ind.compute(closes) else {
            return Signal::hold("MACD undefined (NaN values)");
        };

        let signal = match reading.crossover {
            MacdSignal::Bullish if self.last_signal != SignalKind::Buy => SignalKind::Buy,
            MacdSignal::Bearish if self.last_signal != SignalKind::Sell => SignalKind::Sell,
            _ => SignalKind::Hold,
        };

        if signal.is_directional() {
            self.last_signal = signal;
        }

        let spread = reading.macd.abs() + reading.signal.abs();
        let strength = if spread > 0.0 {
            reading.histogram.abs() / spread
        } else {
            0.0
        };
        let confidence = match signal {
            SignalKind::Hold => strength.min(1.0) * 0.3,
            _ => strength.max(0.5).min(1.0),
        };

        let reason = match (signal, reading.crossover) {
            (SignalKind::Buy, _) => "MACD crossed above signal line".to_string(),
            (SignalKind::Sell, _) => "MACD crossed below signal line".to_string(),
            (SignalKind::Hold, MacdSignal::Neutral) => "No crossover".to_string(),
            (SignalKind::Hold, _) => format!("Crossover ignored, already in {}", self.last_signal),
        };

        Signal::new(signal, confidence)
            .with_reason(reason)
            .with_meta("macd", round_to(reading.macd, 4))
            .with_meta("signal_line", round_to(reading.signal, 4))
            .with_meta("histogram", round_to(reading.histogram, 4))
            .with_meta("fast_period", ind.fast)
            .with_meta("slow_period", ind.slow)
            .with_meta("signal_period", ind.signal)
    }

    fn last_signal(&self) -> SignalKind {
        self.last_signal
    }
}
