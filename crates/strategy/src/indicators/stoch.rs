use super::sma_series;

/// Stochastic oscillator signal line (%D).
///
/// Raw %K over `k` bars, smoothed by an SMA of `smooth_k` bars, then %D is
/// the SMA of smoothed %K over `d` bars.
pub fn stoch_d_series(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k: usize,
    d: usize,
    smooth_k: usize,
) -> Vec<f64> {
    let n = closes.len();
    let mut raw = vec![f64::NAN; n];
    if k == 0 || n < k {
        return raw;
    }

    for end in k..=n {
        let hh = highs[end - k..end].iter().cloned().fold(f64::MIN, f64::max);
        let ll = lows[end - k..end].iter().cloned().fold(f64::MAX, f64::min);
        let range = hh - ll;
        if range > 0.0 {
            raw[end - 1] = 100.0 * (closes[end - 1] - ll) / range;
        }
    }

    let smoothed = sma_series(&raw, smooth_k);
    sma_series(&smoothed, d)
}
