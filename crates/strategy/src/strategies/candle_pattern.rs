use std::fmt;
use std::str::FromStr;

use common::{CandleWindow, Signal, SignalKind, StrategyContext, StrategyParams};

use super::{insufficient_data, round_to};
use crate::indicators::{back, cci_series, mfi_series, sma_series, stoch_d_series, RsiIndicator};
use crate::Strategy;

/// Oscillator used to confirm a candle pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oscillator {
    Rsi,
    Mfi,
    Cci,
    /// Stochastic signal line (%D).
    Stoch,
}

impl FromStr for Oscillator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSI" => Ok(Oscillator::Rsi),
            "MFI" => Ok(Oscillator::Mfi),
            "CCI" => Ok(Oscillator::Cci),
            "STOCH" => Ok(Oscillator::Stoch),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Oscillator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Oscillator::Rsi => "RSI",
            Oscillator::Mfi => "MFI",
            Oscillator::Cci => "CCI",
            Oscillator::Stoch => "STOCH",
        };
        f.write_str(s)
    }
}

/// Three white soldiers / three black crows confirmed by an oscillator.
///
/// Patterns and the oscillator are read on completed bars only; the last
/// bar of the window is treated as still forming.
#[derive(Debug, Clone)]
pub struct CandlePatternOscillatorStrategy {
    /// Upper-cased oscillator name as configured. Unknown names make every
    /// evaluation HOLD.
    oscillator: String,
    pattern_avg_period: usize,
    osc_period: usize,
    stoch_k: usize,
    stoch_d: usize,
    stoch_slow: usize,
    buy_level: f64,
    sell_level: f64,
    last_signal: SignalKind,
}

impl CandlePatternOscillatorStrategy {
    pub const NAME: &'static str = "CANDLE_PATTERN_OSCILLATOR";

    pub fn new(oscillator: Oscillator) -> Self {
        Self {
            oscillator: oscillator.to_string(),
            ..Self::default()
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self {
            oscillator: params.str("oscillator", "RSI").trim().to_ascii_uppercase(),
            pattern_avg_period: params.usize("pattern_avg_period", 12).max(1),
            osc_period: params.usize("osc_period", 37).max(1),
            stoch_k: params.usize("stoch_k", 47).max(1),
            stoch_d: params.usize("stoch_d", 9).max(1),
            stoch_slow: params.usize("stoch_slow", 13).max(1),
            buy_level: params.f64("buy_confirm_level", 40.0),
            sell_level: params.f64("sell_confirm_level", 60.0),
            last_signal: SignalKind::Hold,
        }
    }

    fn min_len(&self) -> usize {
        self.pattern_avg_period.max(self.osc_period).max(self.stoch_k) + 10
    }

    fn oscillator_series(&self, osc: Oscillator, w: &CandleWindow) -> Vec<f64> {
        match osc {
            Oscillator::Rsi => RsiIndicator::new(self.osc_period).series(w.closes()),
            Oscillator::Mfi => mfi_series(w.highs(), w.lows(), w.closes(), w.volumes(), self.osc_period),
            Oscillator::Cci => cci_series(w.highs(), w.lows(), w.closes(), self.osc_period),
            Oscillator::Stoch => stoch_d_series(
                w.highs(),
                w.lows(),
                w.closes(),
                self.stoch_k,
                self.stoch_d,
                self.stoch_slow,
            ),
        }
    }
}

impl Default for CandlePatternOscillatorStrategy {
    fn default() -> Self {
        Self::from_params(&StrategyParams::new())
    }
}

/// One completed bar, reduced to what the patterns look at.
struct Bar {
    body: f64,
    mid: f64,
}

impl Bar {
    fn at(w: &CandleWindow, from_end: usize) -> Self {
        let open = back(w.opens(), from_end);
        let close = back(w.closes(), from_end);
        Self {
            body: close - open,
            mid: (back(w.highs(), from_end) + back(w.lows(), from_end)) / 2.0,
        }
    }
}

impl Strategy for CandlePatternOscillatorStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, window: &CandleWindow, _ctx: &StrategyContext) -> Signal {
        let need = self.min_len();
        if window.len() < need {
            return insufficient_data(need, window.len());
        }

        let osc = match self.oscillator.parse::<Oscillator>() {
            Ok(osc) => osc,
            Err(name) => return Signal::hold(format!("Invalid oscillator type: {name}")),
        };

        let bodies: Vec<f64> = window
            .opens()
            .iter()
            .zip(window.closes())
            .map(|(o, c)| (o - c).abs())
            .collect();
        let avg_body = back(&sma_series(&bodies, self.pattern_avg_period), 1);
        let osc_value = back(&self.oscillator_series(osc, window), 1);

        if !osc_value.is_finite() || !avg_body.is_finite() {
            return Signal::hold("NaN value in calculations");
        }

        // bar1 is the latest completed bar, bar3 the oldest of the three
        let (bar1, bar2, bar3) = (Bar::at(window, 1), Bar::at(window, 2), Bar::at(window, 3));

        let mut signal = SignalKind::Hold;
        let mut reason = "No pattern detected".to_string();
        let mut pattern = "None";

        let soldiers = [&bar1, &bar2, &bar3].iter().all(|b| b.body > avg_body)
            && bar1.mid > bar2.mid
            && bar2.mid > bar3.mid;
        if soldiers {
            pattern = "3_WHITE_SOLDIERS";
            if osc_value < self.buy_level {
                if self.last_signal != SignalKind::Buy {
                    signal = SignalKind::Buy;
                    reason = format!(
                        "3 White Soldiers confirmed by {osc} < {} ({osc_value:.2})",
                        self.buy_level
                    );
                } else {
                    reason = "3 White Soldiers confirmed, but already in BUY".to_string();
                }
            } else {
                reason = format!(
                    "3 White Soldiers detected, but {osc} ({osc_value:.2}) not below {}",
                    self.buy_level
                );
            }
        }

        let crows = [&bar1, &bar2, &bar3].iter().all(|b| -b.body > avg_body)
            && bar1.mid < bar2.mid
            && bar2.mid < bar3.mid;
        if crows {
            pattern = "3_BLACK_CROWS";
            if osc_value > self.sell_level {
                if self.last_signal != SignalKind::Sell {
                    signal = SignalKind::Sell;
                    reason = format!(
                        "3 Black Crows confirmed by {osc} > {} ({osc_value:.2})",
                        self.sell_level
                    );
                } else {
                    reason = "3 Black Crows confirmed, but already in SELL".to_string();
                }
            } else {
                reason = format!(
                    "3 Black Crows detected, but {osc} ({osc_value:.2}) not above {}",
                    self.sell_level
                );
            }
        }

        if signal.is_directional() {
            self.last_signal = signal;
        }

        let confidence = match signal {
            SignalKind::Buy if self.buy_level != 0.0 => (1.0 - osc_value / self.buy_level).max(0.5),
            SignalKind::Sell if self.sell_level != 100.0 => {
                ((osc_value - self.sell_level) / (100.0 - self.sell_level)).max(0.5)
            }
            _ => 0.5,
        };

        Signal::new(signal, confidence.min(1.0))
            .with_reason(reason)
            .with_meta("pattern", pattern)
            .with_meta("oscillator_type", osc.to_string())
            .with_meta("oscillator_value", round_to(osc_value, 2))
    }

    fn last_signal(&self) -> SignalKind {
        self.last_signal
    }
}
