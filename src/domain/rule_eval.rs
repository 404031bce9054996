//! Rule evaluation over a factor series.
//!
//! # Evaluation Semantics
//!
//! - Comparison rules: evaluate at the given bar index; any null operand makes
//!   the comparison `false`
//! - `CROSS_ABOVE`/`CROSS_BELOW`: need both the current and previous bar, so
//!   they are `false` at index 0
//! - `AND`: short-circuits on first `false`
//! - `OR`: short-circuits on first `true`
//! - `NOT`: plain negation, so `NOT` of a null comparison is `true`
//! - `CONSECUTIVE(rule, N)`: child true for N consecutive bars ending at current
//! - `ANY_OF(rule, N)`: child true at least once in the last N bars
//!
//! Temporal rules never look past the start of the series.

use crate::domain::panel::FactorSeries;
use crate::domain::rule::{Operand, Rule};

const EPSILON: f64 = 1e-9;

pub fn evaluate(rule: &Rule, series: &FactorSeries, bar_index: usize) -> bool {
    match rule {
        Rule::CrossAbove { left, right } => {
            crossed(left, right, series, bar_index, |curr, prev| curr > 0.0 && prev <= 0.0)
        }
        Rule::CrossBelow { left, right } => {
            crossed(left, right, series, bar_index, |curr, prev| curr < 0.0 && prev >= 0.0)
        }
        Rule::Above { left, right } => compare(left, right, series, bar_index, |l, r| l > r),
        Rule::Below { left, right } => compare(left, right, series, bar_index, |l, r| l < r),
        Rule::Equals { left, right } => {
            compare(left, right, series, bar_index, |l, r| (l - r).abs() < EPSILON)
        }
        Rule::Between {
            operand,
            lower,
            upper,
        } => resolve_operand(operand, series, bar_index)
            .is_some_and(|v| v >= *lower && v <= *upper),
        Rule::And(rules) => rules.iter().all(|r| evaluate(r, series, bar_index)),
        Rule::Or(rules) => rules.iter().any(|r| evaluate(r, series, bar_index)),
        Rule::Not(rule) => !evaluate(rule, series, bar_index),
        Rule::Consecutive { rule, count } => {
            if *count == 0 || bar_index + 1 < *count {
                return false;
            }
            ((bar_index + 1 - *count)..=bar_index).all(|i| evaluate(rule, series, i))
        }
        Rule::AnyOf { rule, count } => {
            if *count == 0 {
                return false;
            }
            let start = bar_index.saturating_sub(*count - 1);
            (start..=bar_index).any(|i| evaluate(rule, series, i))
        }
    }
}

fn compare<F>(left: &Operand, right: &Operand, series: &FactorSeries, bar_index: usize, op: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (
        resolve_operand(left, series, bar_index),
        resolve_operand(right, series, bar_index),
    ) {
        (Some(l), Some(r)) => op(l, r),
        _ => false,
    }
}

/// Compare the sign of `left - right` now and one bar earlier.
fn crossed<F>(left: &Operand, right: &Operand, series: &FactorSeries, bar_index: usize, op: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    if bar_index == 0 {
        return false;
    }
    let spread = |i: usize| {
        Some(resolve_operand(left, series, i)? - resolve_operand(right, series, i)?)
    };
    match (spread(bar_index), spread(bar_index - 1)) {
        (Some(curr), Some(prev)) => op(curr, prev),
        _ => false,
    }
}

/// Value of an operand at `bar_index`; `None` when any input is null.
pub fn resolve_operand(operand: &Operand, series: &FactorSeries, bar_index: usize) -> Option<f64> {
    match operand {
        Operand::Constant(v) => Some(*v),
        Operand::Column(column) => series.value(*column, bar_index),
        Operand::Scaled { column, multiplier } => {
            series.value(*column, bar_index).map(|v| v * multiplier)
        }
    }
}
