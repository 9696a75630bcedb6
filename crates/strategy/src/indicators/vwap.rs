/// Cumulative volume-weighted average price over typical price
/// `(high + low + close) / 3`. `NaN` while cumulative volume is zero.
pub fn vwap_series(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let typical = (highs[i] + lows[i] + close) / 3.0;
            cum_pv += typical * volumes[i];
            cum_vol += volumes[i];
            if cum_vol > 0.0 {
                cum_pv / cum_vol
            } else {
                f64::NAN
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vwap_weights_by_volume() {
        let p = [10.0, 20.0];
        let v = vwap_series(&p, &p, &p, &[1.0, 3.0]);
        assert_eq!(v[0], 10.0);
        assert!((v[1] - 17.5).abs() < 1e-12);
    }

    #[test]
    fn vwap_undefined_without_volume() {
        let p = [10.0, 20.0];
        let v = vwap_series(&p, &p, &p, &[0.0, 0.0]);
        assert!(v.iter().all(|x| x.is_nan()));
    }
}
