use common::{CandleWindow, Signal, SignalKind, StrategyContext, StrategyParams};

use super::{insufficient_data, round_to};
use crate::indicators::mean;
use crate::Strategy;

/// Trades closes that break the prior `lookback` bars' high or low range,
/// confirmed by above-average volume.
#[derive(Debug, Clone)]
pub struct BreakoutStrategy {
    lookback: usize,
    volume_factor: f64,
    last_signal: SignalKind,
}

impl BreakoutStrategy {
    pub const NAME: &'static str = "BREAKOUT";

    pub fn new(lookback: usize, volume_factor: f64) -> Self {
        Self {
            lookback: lookback.max(1),
            volume_factor,
            last_signal: SignalKind::Hold,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(params.usize("lookback", 20), params.f64("volume_factor", 1.5))
    }
}

impl Default for BreakoutStrategy {
    fn default() -> Self {
        Self::new(20, 1.5)
    }
}

impl Strategy for BreakoutStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, window: &CandleWindow, _ctx: &StrategyContext) -> Signal {
        let n = window.len();
        let need = self.lookback + 5;
        if n < need {
            return insufficient_data(need, n);
        }

        // prior bars only; the current bar is what breaks out
        let prior = n - 1 - self.lookback..n - 1;
        let recent_high = window.highs()[prior.clone()]
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        let recent_low = window.lows()[prior.clone()]
            .iter()
            .cloned()
            .fold(f64::MAX, f64::min);
        let avg_volume = mean(&window.volumes()[prior]);
        let current_volume = window.volumes()[n - 1];
        let price = window.last_close();

        if ![recent_high, recent_low, avg_volume, price].iter().all(|v| v.is_finite()) {
            return Signal::hold("Undefined breakout range");
        }

        let volume_confirmed = current_volume > avg_volume * self.volume_factor;

        let signal = if price > recent_high && volume_confirmed && self.last_signal != SignalKind::Buy {
            SignalKind::Buy
        } else if price < recent_low && volume_confirmed && self.last_signal != SignalKind::Sell {
            SignalKind::Sell
        } else {
            SignalKind::Hold
        };

        if signal.is_directional() {
            self.last_signal = signal;
        }

        let range = recent_high - recent_low;
        let strength = match signal {
            SignalKind::Buy if range > 0.0 => (price - recent_high) / range,
            SignalKind::Sell if range > 0.0 => (recent_low - price) / range,
            _ => 0.0,
        };

        let reason = match signal {
            SignalKind::Buy => format!("Close {price:.2} broke above {}-bar high {recent_high:.2}", self.lookback),
            SignalKind::Sell => format!("Close {price:.2} broke below {}-bar low {recent_low:.2}", self.lookback),
            SignalKind::Hold if !volume_confirmed => "No volume confirmation".to_string(),
            SignalKind::Hold => "No breakout".to_string(),
        };

        Signal::new(signal, (strength * 2.0).min(1.0))
            .with_reason(reason)
            .with_meta("current_price", round_to(price, 2))
            .with_meta("recent_high", round_to(recent_high, 2))
            .with_meta("recent_low", round_to(recent_low, 2))
            .with_meta("volume_confirmed", volume_confirmed)
            .with_meta("lookback", self.lookback)
            .with_meta("volume_factor", self.volume_factor)
    }

    fn last_signal(&self) -> SignalKind {
        self.last_signal
    }
}
