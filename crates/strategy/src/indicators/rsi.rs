/// RSI (Relative Strength Index) indicator.
///
/// Wilder smoothing expressed as an exponential average with
/// `alpha = 1 / period`, seeded with the first price change. The value is
/// undefined (`NaN`) while the smoothed loss is zero.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    /// RSI for every bar. Bar 0 has no change and is always `NaN`.
    pub fn series(&self, closes: &[f64]) -> Vec<f64> {
        let mut out = vec![f64::NAN; closes.len()];
        if closes.len() < 2 {
            return out;
        }

        let alpha = 1.0 / self.period as f64;
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;

        for i in 1..closes.len() {
            let change = closes[i] - closes[i - 1];
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            if i == 1 {
                avg_gain = gain;
                avg_loss = loss;
            } else {
                avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
                avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
            }

            if avg_loss > 0.0 {
                let rs = avg_gain / avg_loss;
                out[i] = 100.0 - 100.0 / (1.0 + rs);
            }
        }
        out
    }

    /// RSI of the latest bar. `None` with fewer than `period + 1` closes.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period + 1 {
            return None;
        }
        self.series(closes).last().copied()
    }
}
