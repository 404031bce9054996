//! True range and Average True Range (Wilder).
//!
//! TR[0] = high - low (no previous close), TR[i] = max(high - low,
//! |high - prev_close|, |low - prev_close|).
//! ATR seed = mean of the first `period` TRs, then Wilder smoothing.

use super::{Series, finite, wilder_average};
use crate::domain::kline::Kline;

pub fn true_range(bars: &[Kline]) -> Series {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if !bar.high.is_finite() || !bar.low.is_finite() {
                return None;
            }
            if i == 0 {
                return finite(bar.high - bar.low);
            }
            let prev_close = bars[i - 1].close;
            if !prev_close.is_finite() {
                return None;
            }
            finite(bar.true_range(prev_close))
        })
        .collect()
}

pub fn atr(bars: &[Kline], period: usize) -> Series {
    wilder_average(&true_range(bars), period)
}
