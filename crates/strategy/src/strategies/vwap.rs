use common::{CandleWindow, Signal, SignalKind, StrategyContext, StrategyParams};

use super::{insufficient_data, round_to};
use crate::indicators::vwap_series;
use crate::Strategy;

/// Trades deviations of the close from the cumulative session VWAP.
#[derive(Debug, Clone)]
pub struct VwapStrategy {
    /// Fractional deviation that triggers a signal (0.02 = 2%).
    threshold: f64,
    last_signal: SignalKind,
}

impl VwapStrategy {
    pub const NAME: &'static str = "VWAP";
    const MIN_BARS: usize = 5;

    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_signal: SignalKind::Hold,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(params.f64("threshold", 0.02))
    }
}

impl Default for VwapStrategy {
    fn default() -> Self {
        Self::new(0.02)
    }
}

impl Strategy for VwapStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, window: &CandleWindow, _ctx: &StrategyContext) -> Signal {
        if window.len() < Self::MIN_BARS {
            return insufficient_data(Self::MIN_BARS, window.len());
        }

        let vwap = vwap_series(window.highs(), window.lows(), window.closes(), window.volumes());
        let price = window.last_close();
        let current_vwap = vwap.last().copied().unwrap_or(f64::NAN);
        let deviation = (price - current_vwap) / current_vwap;

        if !deviation.is_finite() {
            return Signal::hold("VWAP undefined (zero cumulative volume)");
        }

        let signal = if deviation < -self.threshold && self.last_signal != SignalKind::Buy {
            SignalKind::Buy
        } else if deviation > self.threshold && self.last_signal != SignalKind::Sell {
            SignalKind::Sell
        } else {
            SignalKind::Hold
        };

        if signal.is_directional() {
            self.last_signal = signal;
        }

        let confidence = if self.threshold > 0.0 {
            (deviation.abs() / self.threshold).min(1.0)
        } else {
            1.0
        };

        let reason = match signal {
            SignalKind::Buy => format!("Price {:.2}% below VWAP", -deviation * 100.0),
            SignalKind::Sell => format!("Price {:.2}% above VWAP", deviation * 100.0),
            SignalKind::Hold => "Price within VWAP threshold".to_string(),
        };

        Signal::new(signal, confidence)
            .with_reason(reason)
            .with_meta("current_price", round_to(price, 2))
            .with_meta("vwap", round_to(current_vwap, 2))
            .with_meta("deviation_pct", round_to(deviation * 100.0, 2))
            .with_meta("threshold_percent", self.threshold * 100.0)
    }

    fn last_signal(&self) -> SignalKind {
        self.last_signal
    }
}
