//! Open and close signal generation.
//!
//! Both functions are pure: the same inputs always give the same answer and
//! nothing outside the return value is touched.

use crate::domain::factor::{Factor, FactorRef};
use crate::domain::panel::FactorRow;
use crate::domain::position::{ExitReason, Position, Side};
use crate::domain::rule_eval::evaluate;
use crate::domain::strategy::{ExitParams, Strategy};

/// A selected candidate for the next entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenSignal {
    pub symbol: String,
    pub interval: String,
    pub timestamp: i64,
    pub side: Side,
    /// Close of the signal bar.
    pub reference_price: f64,
    pub rank_value: f64,
    /// Every column consulted by the ranking and the entry rule, with its
    /// value on the signal row.
    pub audit: Vec<(FactorRef, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseSignal {
    pub exit_price: f64,
    pub stop_price: f64,
    /// ATR distance unit after capping.
    pub atr: f64,
    pub reason: ExitReason,
}

/// Pick at most one entry from a cross-sectional slice.
///
/// Rows with a null ranking value are dropped, the rest sorted by it
/// descending (ties keep the slice's (symbol, interval) order) and cut to
/// `top_n`. The first row passing the entry rule wins.
pub fn generate_open_signal(slice: &[FactorRow<'_>], strategy: &Strategy) -> Option<OpenSignal> {
    let mut ranked: Vec<(&FactorRow<'_>, f64)> = slice
        .iter()
        .filter_map(|row| row.value(strategy.rank_by).map(|v| (row, v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (row, rank_value) = ranked
        .into_iter()
        .take(strategy.top_n)
        .find(|(row, _)| evaluate(&strategy.entry_rule, row.series, row.index))?;

    Some(OpenSignal {
        symbol: row.symbol().to_string(),
        interval: row.interval().to_string(),
        timestamp: row.timestamp(),
        side: strategy.side,
        reference_price: row.kline().close,
        rank_value,
        audit: strategy
            .audit_columns()
            .into_iter()
            .map(|c| (c, row.value(c)))
            .collect(),
    })
}

/// Trailing-stop check for `position` on `row`.
///
/// The stop sits `atr_multiplier` ATRs behind the position's running extreme.
/// ATR is capped at `atr_cap_pct`% of the entry price; a null ATR falls back
/// to the cap, and with no cap configured there is no signal.
pub fn generate_close_signal(
    position: &Position,
    row: &FactorRow<'_>,
    exit: &ExitParams,
) -> Option<CloseSignal> {
    let cap = exit
        .atr_cap_pct
        .map(|pct| position.entry_price * pct / 100.0)
        .filter(|c| c.is_finite() && *c > 0.0);
    let atr = match (row.get(Factor::Atr), cap) {
        (Some(a), Some(c)) => a.min(c),
        (Some(a), None) => a,
        (None, Some(c)) => c,
        (None, None) => return None,
    };

    let distance = exit.atr_multiplier * atr;
    let kline = row.kline();
    let (stop_price, gapped, touched) = match position.side {
        Side::Long => {
            let stop = position.extreme - distance;
            (stop, kline.open <= stop, kline.low <= stop)
        }
        Side::Short => {
            let stop = position.extreme + distance;
            (stop, kline.open >= stop, kline.high >= stop)
        }
    };

    if gapped {
        Some(CloseSignal {
            exit_price: kline.open,
            stop_price,
            atr,
            reason: ExitReason::GapThroughStop,
        })
    } else if touched {
        Some(CloseSignal {
            exit_price: stop_price,
            stop_price,
            atr,
            reason: ExitReason::TrailingStop,
        })
    } else {
        None
    }
}
