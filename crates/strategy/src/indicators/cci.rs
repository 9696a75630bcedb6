/// Commodity Channel Index: `(tp - sma(tp)) / (0.015 * mean_abs_dev(tp))`.
pub fn cci_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }

    let typical: Vec<f64> = (0..n).map(|i| (highs[i] + lows[i] + closes[i]) / 3.0).collect();
    for end in period..=n {
        let window = &typical[end - period..end];
        let mean = super::mean(window);
        let mad = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
        if mad > 0.0 {
            out[end - 1] = (typical[end - 1] - mean) / (0.015 * mad);
        }
    }
    out
}
