//! Rolling indicator primitives.
//!
//! Every function here works on a single ordered series and returns a
//! [`Series`] of the same length, `None` wherever the value is undefined:
//! - during warmup (the window is not yet full)
//! - wherever the window touches a non-finite input
//!
//! Indicators are computed inclusive of the bar they annotate. Shifting them
//! onto the following bar is the caller's job (see [`prior_bar`]).

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod donchian;
pub mod moving_average;
pub mod roc;
pub mod stddev;

/// A time series of optional indicator values, one per bar.
pub type Series = Vec<Option<f64>>;

/// `Some(v)` for finite `v`, `None` otherwise.
pub fn finite(v: f64) -> Option<f64> {
    if v.is_finite() { Some(v) } else { None }
}

/// Apply `f` to every full trailing window of `period` values.
///
/// The output at `i` is `None` when `i < period - 1` or when any value in
/// `values[i + 1 - period..=i]` is non-finite.
pub fn rolling<F>(values: &[f64], period: usize, f: F) -> Series
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in period.saturating_sub(1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_finite()) {
            out[i] = finite(f(window));
        }
    }
    out
}

/// Lag a series by `bars`: output[i] = series[i - bars].
pub fn shift(series: &[Option<f64>], bars: usize) -> Series {
    let mut out = vec![None; series.len()];
    for i in bars..series.len() {
        out[i] = series[i - bars];
    }
    out
}

/// Move an inclusive indicator onto the next bar so that row `t` only sees
/// bars up to `t - 1`.
pub fn prior_bar(series: &[Option<f64>]) -> Series {
    shift(series, 1)
}

/// Wilder smoothing: seed with the mean of the first `period` values, then
/// `next = (prev * (period - 1) + x) / period`.
///
/// A `None` input resets the recursion; the seed is rebuilt from the values
/// that follow it.
pub fn wilder_average(values: &[Option<f64>], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let n = period as f64;
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;
    let mut prev: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        match (*value, prev) {
            (None, _) => {
                seed_sum = 0.0;
                seed_count = 0;
                prev = None;
            }
            (Some(x), Some(p)) => {
                let next = (p * (n - 1.0) + x) / n;
                out[i] = Some(next);
                prev = Some(next);
            }
            (Some(x), None) => {
                seed_sum += x;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / n;
                    out[i] = Some(seed);
                    prev = Some(seed);
                }
            }
        }
    }
    out
}
