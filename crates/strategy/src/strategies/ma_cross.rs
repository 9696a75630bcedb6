use common::{CandleWindow, Signal, SignalKind, StrategyContext, StrategyParams};
use serde_json::json;

use super::{insufficient_data, round_to};
use crate::indicators::{back, sample_std, sma_series};
use crate::Strategy;

/// Price crossing its simple moving average.
#[derive(Debug, Clone)]
pub struct MovingAverageCrossStrategy {
    period: usize,
    last_signal: SignalKind,
}

impl MovingAverageCrossStrategy {
    pub const NAME: &'static str = "MA_CROSS";

    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(2),
            last_signal: SignalKind::Hold,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(params.usize("ma_period", 12))
    }
}

impl Default for MovingAverageCrossStrategy {
    fn default() -> Self {
        Self::new(12)
    }
}

impl Strategy for MovingAverageCrossStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, window: &CandleWindow, _ctx: &StrategyContext) -> Signal {
        let closes = window.closes();
        let need = self.period + 5;
        if closes.len() < need {
            return insufficient_data(need, closes.len()).with_meta("ma_value", 0);
        }

        let sma = sma_series(closes, self.period);
        let (price, prev_price) = (back(closes, 0), back(closes, 1));
        let (current_sma, prev_sma) = (back(&sma, 0), back(&sma, 1));
        if !current_sma.is_finite() || !prev_sma.is_finite() {
            return Signal::hold("Insufficient data for MA calculation (NaN)").with_meta("ma_value", 0);
        }

        let mut signal = SignalKind::Hold;
        let mut reason = "No crossover".to_string();

        if prev_price < prev_sma && price >= current_sma && self.last_signal != SignalKind::Buy {
            signal = SignalKind::Buy;
            reason = format!("Price crossed above SMA({})", self.period);
        } else if prev_price > prev_sma && price <= current_sma && self.last_signal != SignalKind::Sell {
            signal = SignalKind::Sell;
            reason = format!("Price crossed below SMA({})", self.period);
        }

        if signal.is_directional() {
            self.last_signal = signal;
        }

        // Fresher crosses (close still near the average) score higher.
        let price_std = sample_std(&closes[closes.len() - self.period..]);
        let mut confidence = if price_std > 0.0 {
            let distance = (price - current_sma).abs() / price_std;
            (1.0 - distance * 0.5).max(0.5)
        } else {
            0.5
        };
        if signal == SignalKind::Hold {
            confidence *= 0.3;
        }

        Signal::new(signal, confidence)
            .with_reason(reason)
            .with_meta("price", round_to(price, 4))
            .with_meta("ma_value", round_to(current_sma, 4))
            .with_meta("params", json!({ "period": self.period }))
    }

    fn last_signal(&self) -> SignalKind {
        self.last_signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testing::{closes_window, ctx};

    fn crossing(prev: f64, last: f64) -> CandleWindow {
        let mut closes = vec![100.0; 15];
        closes.push(prev);
        closes.push(last);
        closes_window(&closes)
    }

    #[test]
    fn short_window_holds() {
        let mut s = MovingAverageCrossStrategy::default();
        let sig = s.evaluate(&closes_window(&[100.0; 16]), &ctx());
        assert_eq!(sig.reason(), Some("Insufficient data: need 17, got 16"));
        assert_eq!(sig.meta["ma_value"], 0);
    }

    #[test]
    fn cross_above_buys() {
        let mut s = MovingAverageCrossStrategy::default();
        let sig = s.evaluate(&crossing(98.0, 102.0), &ctx());
        assert_eq!(sig.signal, SignalKind::Buy);
        assert_eq!(sig.confidence, 0.5);
        assert_eq!(sig.reason(), Some("Price crossed above SMA(12)"));
    }

    #[test]
    fn cross_below_sells() {
        let mut s = MovingAverageCrossStrategy::default();
        let sig = s.evaluate(&crossing(102.0, 98.0), &ctx());
        assert_eq!(sig.signal, SignalKind::Sell);
    }

    #[test]
    fn flat_series_holds_with_damped_confidence() {
        let mut s = MovingAverageCrossStrategy::default();
        let sig = s.evaluate(&closes_window(&[100.0; 20]), &ctx());
        assert!(sig.is_hold());
        assert_eq!(sig.reason(), Some("No crossover"));
        assert_eq!(sig.confidence, 0.15);
    }

    #[test]
    fn repeated_cross_suppressed() {
        let mut s = MovingAverageCrossStrategy::default();
        let w = crossing(98.0, 102.0);
        assert_eq!(s.evaluate(&w, &ctx()).signal, SignalKind::Buy);
        assert!(s.evaluate(&w, &ctx()).is_hold());
        assert_eq!(s.last_signal(), SignalKind::Buy);
    }
}
