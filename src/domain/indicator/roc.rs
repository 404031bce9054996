//! ROC (Rate of Change) indicator.
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! Undefined when C[i-n] is 0 or unavailable.
//! Warmup: first n bars are undefined.

use super::{Series, finite};

pub fn roc(closes: &[f64], period: usize) -> Series {
    let mut values = vec![None; closes.len()];
    if period == 0 {
        return values;
    }

    for i in period..closes.len() {
        let prev_close = closes[i - period];
        let curr_close = closes[i];

        if prev_close == 0.0 || !prev_close.is_finite() || !curr_close.is_finite() {
            continue;
        }
        values[i] = finite(((curr_close - prev_close) / prev_close) * 100.0);
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roc_warmup() {
        let series = roc(&[100.0, 105.0, 110.0, 115.0, 120.0], 3);

        assert!(series[0].is_none());
        assert!(series[1].is_none());
        assert!(series[2].is_none());
        assert!(series[3].is_some());
        assert!(series[4].is_some());
    }

    #[test]
    fn roc_basic_calculation() {
        let series = roc(&[100.0, 105.0, 110.0, 115.0], 2);

        let expected = ((110.0 - 100.0) / 100.0) * 100.0;
        assert!((series[2].unwrap() - expected).abs() < f64::EPSILON);

        let expected = ((115.0 - 105.0) / 105.0) * 100.0;
        assert!((series[3].unwrap() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn roc_zero_base_is_undefined() {
        let series = roc(&[0.0, 100.0, 110.0], 2);
        assert!(series[2].is_none());
    }

    #[test]
    fn roc_negative_change() {
        let series = roc(&[100.0, 90.0, 80.0], 2);
        let v = series[2].unwrap();
        assert!((v - (-20.0)).abs() < f64::EPSILON);
        assert!(v < 0.0);
    }

    #[test]
    fn roc_nan_close() {
        let series = roc(&[100.0, f64::NAN, 120.0, 130.0], 1);
        assert!(series[1].is_none());
        assert!(series[2].is_none());
        assert!((series[3].unwrap() - 100.0 / 12.0).abs() < 1e-12);
    }
}
