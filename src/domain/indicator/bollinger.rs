//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are undefined.

use super::Series;
use super::moving_average::sma;
use super::stddev::stddev;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

pub fn bollinger(closes: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    let middle = sma(closes, period);
    let deviation = stddev(closes, period);

    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];
    for i in 0..closes.len() {
        if let (Some(mid), Some(sd)) = (middle[i], deviation[i]) {
            upper[i] = Some(mid + multiplier * sd);
            lower[i] = Some(mid - multiplier * sd);
        }
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}
