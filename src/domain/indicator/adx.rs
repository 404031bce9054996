//! ADX (Average Directional Index), Wilder's definition.
//!
//! 1. +DM = up move if up > down and up > 0, else 0 (mirror for -DM)
//! 2. Wilder-smooth TR, +DM and -DM over `period`
//! 3. +DI = 100 * +DM / TR, -DI = 100 * -DM / TR
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX over `period`
//!
//! The first bar has no directional movement, so DI is defined from bar
//! `period` and ADX from bar `2 * period - 1`.

use super::{Series, wilder_average};
use crate::domain::kline::Kline;

#[derive(Debug, Clone, PartialEq)]
pub struct AdxSeries {
    pub adx: Series,
    pub plus_di: Series,
    pub minus_di: Series,
}

/// (+DM, -DM, TR) for bar `i`; `None` when any input is non-finite.
fn directional_movement(bars: &[Kline], i: usize) -> Option<(f64, f64, f64)> {
    let (curr, prev) = (&bars[i], &bars[i - 1]);
    let inputs = [curr.high, curr.low, prev.high, prev.low, prev.close];
    if !inputs.iter().all(|v| v.is_finite()) {
        return None;
    }

    let up = curr.high - prev.high;
    let down = prev.low - curr.low;
    let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
    let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
    Some((plus_dm, minus_dm, curr.true_range(prev.close)))
}

pub fn adx(bars: &[Kline], period: usize) -> AdxSeries {
    let len = bars.len();
    let mut plus_dm = vec![None; len];
    let mut minus_dm = vec![None; len];
    let mut tr = vec![None; len];

    for i in 1..len {
        if let Some((p, m, t)) = directional_movement(bars, i) {
            plus_dm[i] = Some(p);
            minus_dm[i] = Some(m);
            tr[i] = Some(t);
        }
    }

    let smoothed_plus = wilder_average(&plus_dm, period);
    let smoothed_minus = wilder_average(&minus_dm, period);
    let smoothed_tr = wilder_average(&tr, period);

    let mut plus_di = vec![None; len];
    let mut minus_di = vec![None; len];
    let mut dx = vec![None; len];

    for i in 0..len {
        let (Some(p), Some(m), Some(t)) = (smoothed_plus[i], smoothed_minus[i], smoothed_tr[i])
        else {
            continue;
        };
        let (pdi, mdi) = if t > 0.0 {
            (100.0 * p / t, 100.0 * m / t)
        } else {
            (0.0, 0.0)
        };
        let di_sum = pdi + mdi;
        plus_di[i] = Some(pdi);
        minus_di[i] = Some(mdi);
        dx[i] = Some(if di_sum > 0.0 {
            100.0 * (pdi - mdi).abs() / di_sum
        } else {
            0.0
        });
    }

    AdxSeries {
        adx: wilder_average(&dx, period),
        plus_di,
        minus_di,
    }
}
