use common::{CandleWindow, ExternalAlert, Signal, SignalKind, StrategyContext, StrategyParams};

use crate::Strategy;

const SOURCE: &str = "TRADINGVIEW";
const DEFAULT_ALERT_CONFIDENCE: f64 = 0.8;
const MAX_PRICE_DEVIATION: f64 = 0.1;
const DEVIATION_PENALTY: f64 = 0.7;

/// Passes through alerts pushed by TradingView webhooks.
///
/// The candle window is only used to sanity-check the alert price against
/// the last close.
#[derive(Debug, Clone)]
pub struct TradingViewStrategy {
    min_confidence: f64,
    last_signal: SignalKind,
}

impl TradingViewStrategy {
    pub const NAME: &'static str = "TRADINGVIEW";

    pub fn new(min_confidence: f64) -> Self {
        Self {
            min_confidence,
            last_signal: SignalKind::Hold,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(params.f64("min_confidence", 0.7))
    }

    fn parse_action(action: &str) -> Option<SignalKind> {
        match action.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(SignalKind::Buy),
            "SELL" | "CLOSE" => Some(SignalKind::Sell),
            "HOLD" => Some(SignalKind::Hold),
            _ => None,
        }
    }
}

impl Default for TradingViewStrategy {
    fn default() -> Self {
        Self::new(0.7)
    }
}

fn alert_strategy(alert: &ExternalAlert) -> String {
    alert.strategy.clone().unwrap_or_else(|| "Unknown".to_string())
}

impl Strategy for TradingViewStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, window: &CandleWindow, ctx: &StrategyContext) -> Signal {
        let Some(alert) = ctx.alert.as_ref() else {
            return Signal::hold("No TradingView alert data provided").with_meta("source", SOURCE);
        };

        let Some(signal) = Self::parse_action(&alert.action) else {
            return Signal::hold(format!("Invalid action: {}", alert.action.to_ascii_uppercase()))
                .with_meta("source", SOURCE);
        };

        let interval = alert.interval.clone().unwrap_or_else(|| ctx.timeframe.clone());

        let mut confidence = alert.confidence.unwrap_or(DEFAULT_ALERT_CONFIDENCE);
        if let Some(price) = alert.price.filter(|p| *p > 0.0) {
            let last_close = window.last_close();
            if last_close > 0.0 && (price - last_close).abs() / last_close > MAX_PRICE_DEVIATION {
                confidence *= DEVIATION_PENALTY;
            }
        }

        if signal.is_directional() && confidence < self.min_confidence {
            return Signal::new(SignalKind::Hold, confidence)
                .with_reason(format!(
                    "Confidence {confidence:.2} below minimum {}",
                    self.min_confidence
                ))
                .with_meta("original_signal", signal.to_string())
                .with_meta("tradingview_strategy", alert_strategy(alert))
                .with_meta("interval", interval)
                .with_meta("source", SOURCE);
        }

        if signal.is_directional() && signal == self.last_signal {
            return Signal::hold(format!("Alert repeats last signal {signal}"))
                .with_meta("original_signal", signal.to_string())
                .with_meta("source", SOURCE);
        }

        if signal.is_directional() {
            self.last_signal = signal;
        }

        Signal::new(signal, confidence)
            .with_reason(format!("TradingView alert {}", alert.action.to_ascii_uppercase()))
            .with_meta("price", alert.price)
            .with_meta("tradingview_strategy", alert_strategy(alert))
            .with_meta("interval", interval)
            .with_meta("message", alert.message.clone().unwrap_or_default())
            .with_meta("source", SOURCE)
    }

    fn last_signal(&self) -> SignalKind {
        self.last_signal
    }
}
