//! Technical indicators over oldest-first price slices.
//!
//! Series functions return one value per input bar; bars where the
//! indicator is undefined (warm-up, zero divisor) hold `NaN`.

pub mod cci;
pub mod macd;
pub mod mfi;
pub mod rsi;
pub mod stoch;
pub mod vwap;

pub use cci::cci_series;
pub use macd::{MacdIndicator, MacdReading, MacdSignal};
pub use mfi::mfi_series;
pub use rsi::RsiIndicator;
pub use stoch::stoch_d_series;
pub use vwap::vwap_series;

/// Simple moving average. A window containing `NaN` yields `NaN`.
pub fn sma_series(data: &[f64], period: usize) -> Vec<f64> {
    rolling(data, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Rolling sample standard deviation (n - 1 denominator).
pub fn std_series(data: &[f64], period: usize) -> Vec<f64> {
    rolling(data, period, sample_std)
}

/// Exponential moving average seeded with the SMA of the first `period`
/// defined values.
pub fn ema_series(data: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; data.len()];
    if period == 0 {
        return out;
    }
    let Some(first) = data.iter().position(|v| v.is_finite()) else {
        return out;
    };
    let seed_end = first + period;
    if seed_end > data.len() {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = data[first..seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = ema;
    for i in seed_end..data.len() {
        ema = data[i] * k + ema * (1.0 - k);
        out[i] = ema;
    }
    out
}

/// Sample standard deviation of a slice; `NaN` with fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Mean of a slice; `NaN` when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Value at `index` counted from the end (0 = last bar).
pub fn back(series: &[f64], index: usize) -> f64 {
    series
        .len()
        .checked_sub(index + 1)
        .map(|i| series[i])
        .unwrap_or(f64::NAN)
}

fn rolling<F>(data: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![f64::NAN; data.len()];
    if period == 0 || period > data.len() {
        return out;
    }
    for end in period..=data.len() {
        let window = &data[end - period..end];
        if window.iter().all(|v| v.is_finite()) {
            out[end - 1] = f(window);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_has_warmup_then_values() {
        let s = sma_series(&[1.0, 2.0, 3.0, 4.0], 2);
        assert!(s[0].is_nan());
        assert_eq!(&s[1..], &[1.5, 2.5, 3.5]);
    }

    #[test]
    fn sample_std_matches_hand_computation() {
        // mean 5, squared deviations sum 32, n-1 = 7
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_std(&v) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn ema_seeds_with_sma() {
        let e = ema_series(&[2.0, 4.0, 6.0, 8.0], 3);
        assert!(e[1].is_nan());
        assert!((e[2] - 4.0).abs() < 1e-12);
        // k = 0.5 → 8 * 0.5 + 4 * 0.5
        assert!((e[3] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn back_indexes_from_the_end() {
        let s = [1.0, 2.0, 3.0];
        assert_eq!(back(&s, 0), 3.0);
        assert_eq!(back(&s, 2), 1.0);
        assert!(back(&s, 3).is_nan());
    }

    #[test]
    fn nan_inside_window_propagates() {
        let s = sma_series(&[1.0, f64::NAN, 3.0, 4.0], 2);
        assert!(s[1].is_nan() && s[2].is_nan());
        assert_eq!(s[3], 3.5);
    }
}
