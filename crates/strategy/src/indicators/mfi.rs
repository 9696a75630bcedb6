/// Money Flow Index over `period` bars.
///
/// Typical-price money flow is split into positive and negative flow by the
/// direction of the typical price change; `100 * pos / (pos + neg)`.
pub fn mfi_series(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    volumes: &[f64],
    period: usize,
) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return out;
    }

    let typical: Vec<f64> = (0..n).map(|i| (highs[i] + lows[i] + closes[i]) / 3.0).collect();
    let mut pos = vec![0.0; n];
    let mut neg = vec![0.0; n];
    for i in 1..n {
        let flow = typical[i] * volumes[i];
        if typical[i] > typical[i - 1] {
            pos[i] = flow;
        } else if typical[i] < typical[i - 1] {
            neg[i] = flow;
        }
    }

    for end in period..n {
        let start = end + 1 - period;
        let p: f64 = pos[start..=end].iter().sum();
        let m: f64 = neg[start..=end].iter().sum();
        if p + m > 0.0 {
            out[end] = 100.0 * p / (p + m);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mfi_is_100_when_only_rising() {
        let p: Vec<f64> = (0..10).map(|i| 10.0 + i as f64).collect();
        let v = vec![5.0; 10];
        let mfi = mfi_series(&p, &p, &p, &v, 4);
        assert!(mfi[3].is_nan());
        assert!((mfi[9] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn mfi_balanced_flows_is_midpoint() {
        let p = [10.0, 11.0, 10.0, 11.0, 10.0];
        let v = [1.0, 10.0, 11.0, 10.0, 11.0];
        // flows: +110, -110, +110, -110
        let mfi = mfi_series(&p, &p, &p, &v, 4);
        assert!((mfi[4] - 50.0).abs() < 1e-9);
    }
}
