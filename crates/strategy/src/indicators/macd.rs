use super::ema_series;

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// Computes: MACD line = EMA(fast) − EMA(slow), Signal = EMA(macd_line, signal_period).
/// Reports crossover events when the MACD line crosses the signal line.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// Crossover state on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MacdSignal {
    Bullish, // MACD crossed above signal line
    Bearish, // MACD crossed below signal line
    Neutral, // No crossover on the latest bar
}

/// Latest MACD values plus the crossover state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub crossover: MacdSignal,
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }

    /// Fewest closes that yield two defined signal-line values.
    pub fn min_len(&self) -> usize {
        self.slow + self.signal
    }

    pub fn is_valid(&self) -> bool {
        self.fast >= 1 && self.signal >= 1 && self.fast < self.slow
    }

    /// MACD line and signal line for every bar.
    pub fn series(&self, closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let fast = ema_series(closes, self.fast);
        let slow = ema_series(closes, self.slow);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_series(&macd, self.signal);
        (macd, signal)
    }

    /// Compute the latest reading from close prices (oldest first).
    /// Returns `None` if there isn't enough data or any value is undefined.
    pub fn compute(&self, closes: &[f64]) -> Option<MacdReading> {
        if !self.is_valid() || closes.len() < self.min_len() {
            return None;
        }

        let (macd, signal) = self.series(closes);
        let n = closes.len();
        let (prev_macd, curr_macd) = (macd[n - 2], macd[n - 1]);
        let (prev_sig, curr_sig) = (signal[n - 2], signal[n - 1]);
        if [prev_macd, curr_macd, prev_sig, curr_sig]
            .iter()
            .any(|v| !v.is_finite())
        {
            return None;
        }

        let crossover = if prev_macd <= prev_sig && curr_macd > curr_sig {
            MacdSignal::Bullish
        } else if prev_macd >= prev_sig && curr_macd < curr_sig {
            MacdSignal::Bearish
        } else {
            MacdSignal::Neutral
        };

        Some(MacdReading {
            crossover,
            macd: curr_macd,
            signal: curr_sig,
            histogram: curr_macd - curr_sig,
        })
    }
}
