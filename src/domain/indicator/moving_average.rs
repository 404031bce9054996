//! Simple moving average.
//!
//! SMA(n)[i] = sum(v[i-n+1..=i]) / n
//! Warmup: first (n-1) bars are undefined.

use super::{Series, rolling};

pub fn sma(values: &[f64], period: usize) -> Series {
    rolling(values, period, |window| {
        window.iter().sum::<f64>() / window.len() as f64
    })
}
