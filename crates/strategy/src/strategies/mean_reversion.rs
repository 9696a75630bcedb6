use common::{CandleWindow, Signal, SignalKind, StrategyContext, StrategyParams};
use serde_json::json;

use super::{insufficient_data, round_to};
use crate::indicators::{mean, sample_std};
use crate::Strategy;

/// Bollinger band / Z-score mean reversion with hysteresis.
///
/// Enters against large deviations from the moving average and returns to
/// neutral (resetting `last_signal`) once price is back near the mean.
#[derive(Debug, Clone)]
pub struct MeanReversionStrategy {
    window: usize,
    std_dev_factor: f64,
    z_entry: f64,
    z_exit: f64,
    last_signal: SignalKind,
}

impl MeanReversionStrategy {
    pub const NAME: &'static str = "MEAN_REVERSION";

    pub fn new(window: usize, std_dev_factor: f64, z_entry: f64, z_exit: f64) -> Self {
        Self {
            window: window.max(2),
            std_dev_factor,
            z_entry,
            z_exit,
            last_signal: SignalKind::Hold,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(
            params.usize("window", 20),
            params.f64("std_dev_factor", 2.0),
            params.f64("z_entry", 2.0),
            params.f64("z_exit", 0.5),
        )
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new(20, 2.0, 2.0, 0.5)
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, window: &CandleWindow, _ctx: &StrategyContext) -> Signal {
        let closes = window.closes();
        let need = self.window + 5;
        if closes.len() < need {
            return insufficient_data(need, closes.len());
        }

        let recent = &closes[closes.len() - self.window..];
        let price = window.last_close();
        let ma = mean(recent);
        let std = sample_std(recent);
        let z = if std > 0.0 { (price - ma) / std } else { f64::NAN };

        if ![price, ma, std, z].iter().all(|v| v.is_finite()) {
            return Signal::hold("Insufficient historical data for calculation (NaN values)");
        }

        let upper = ma + std * self.std_dev_factor;
        let lower = ma - std * self.std_dev_factor;

        let mut signal = SignalKind::Hold;
        let mut reason = "No signal threshold met".to_string();

        if z < -self.z_entry && self.last_signal != SignalKind::Buy {
            signal = SignalKind::Buy;
            reason = format!("Oversold: Z-score {z:.2} < -{}", self.z_entry);
        } else if z > self.z_entry && self.last_signal != SignalKind::Sell {
            signal = SignalKind::Sell;
            reason = format!("Overbought: Z-score {z:.2} > {}", self.z_entry);
        } else if z.abs() < self.z_exit && self.last_signal.is_directional() {
            reason = format!(
                "Mean reversion: Z-score {z:.2} near 0 (exit threshold {})",
                self.z_exit
            );
            self.last_signal = SignalKind::Hold;
        }

        if signal.is_directional() {
            self.last_signal = signal;
        }

        let z_confidence = if self.z_entry > 0.0 {
            (z.abs() / self.z_entry).min(1.0)
        } else {
            0.0
        };
        let band_width = upper - lower;
        let band_confidence = if band_width > 0.0 {
            ((price - ma).abs() / (band_width / 2.0)).min(1.0)
        } else {
            0.0
        };
        let mut confidence = z_confidence * 0.6 + band_confidence * 0.4;
        if signal == SignalKind::Hold {
            confidence *= 0.3;
        }

        Signal::new(signal, confidence)
            .with_reason(reason)
            .with_meta("z_score", round_to(z, 3))
            .with_meta(
                "bands",
                json!({
                    "upper": round_to(upper, 2),
                    "middle": round_to(ma, 2),
                    "lower": round_to(lower, 2),
                }),
            )
            .with_meta("current_price", round_to(price, 2))
            .with_meta("window", self.window)
            .with_meta("std_dev_factor", self.std_dev_factor)
            .with_meta("z_entry", self.z_entry)
            .with_meta("z_exit", self.z_exit)
    }

    fn last_signal(&self) -> SignalKind {
        self.last_signal
    }
}
