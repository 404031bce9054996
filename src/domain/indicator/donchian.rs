//! Donchian channel: rolling max of highs and min of lows.

use super::{Series, rolling};

pub fn rolling_max(values: &[f64], period: usize) -> Series {
    rolling(values, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn rolling_min(values: &[f64], period: usize) -> Series {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Returns `(upper, lower)`.
pub fn donchian(highs: &[f64], lows: &[f64], period: usize) -> (Series, Series) {
    (rolling_max(highs, period), rolling_min(lows, period))
}
