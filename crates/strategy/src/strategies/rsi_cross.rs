use common::{CandleWindow, Signal, SignalKind, StrategyContext, StrategyParams};

use super::{insufficient_data, round_to};
use crate::indicators::RsiIndicator;
use crate::Strategy;

/// Buys when RSI drops below the oversold level and sells above the
/// overbought level, never repeating its last direction.
#[derive(Debug, Clone)]
pub struct RsiCrossStrategy {
    indicator: RsiIndicator,
    overbought: f64,
    oversold: f64,
    last_signal: SignalKind,
}

impl RsiCrossStrategy {
    pub const NAME: &'static str = "RSI_CROSS";

    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        Self {
            indicator: RsiIndicator::new(period),
            overbought,
            oversold,
            last_signal: SignalKind::Hold,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(
            params.usize("period", 14),
            params.f64("overbought", 70.0),
            params.f64("oversold", 30.0),
        )
    }

    fn min_len(&self) -> usize {
        self.indicator.period + 5
    }
}

impl Default for RsiCrossStrategy {
    fn default() -> Self {
        Self::new(14, 70.0, 30.0)
    }
}

impl Strategy for RsiCrossStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, window: &CandleWindow, _ctx: &StrategyContext) -> Signal {
        let closes = window.closes();
        if closes.len() < self.min_len() {
            return insufficient_data(self.min_len(), closes.len());
        }

        let rsi = match self.indicator.compute(closes) {
            Some(v) if v.is_finite() => v,
            _ => return Signal::hold("RSI undefined (no losses in window)"),
        };

        let signal = if rsi < self.oversold && self.last_signal != SignalKind::Buy {
            SignalKind::Buy
        } else if rsi > self.overbought && self.last_signal != SignalKind::Sell {
            SignalKind::Sell
        } else {
            SignalKind::Hold
        };

        if signal.is_directional() {
            self.last_signal = signal;
        }

        let reason = match signal {
            SignalKind::Buy => format!("RSI {rsi:.2} below oversold {}", self.oversold),
            SignalKind::Sell => format!("RSI {rsi:.2} above overbought {}", self.overbought),
            SignalKind::Hold => "No threshold crossed".to_string(),
        };

        Signal::new(signal, (rsi - 50.0).abs() / 50.0)
            .with_reason(reason)
            .with_meta("rsi", round_to(rsi, 2))
            .with_meta("overbought", self.overbought)
            .with_meta("oversold", self.oversold)
    }

    fn last_signal(&self) -> SignalKind {
        self.last_signal
    }
}
