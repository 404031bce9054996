//! Trade economics: position sizing, fees and profit.
//!
//! - margin = balance * margin_fraction, capped by `max_notional`
//! - quantity = margin / entry price (fractional)
//! - fee per leg = price * quantity * fee_rate
//! - profit = side * quantity * (exit - entry) - entry fee - exit fee
//! - profit % = profit / margin * 100

use super::account::Account;
use super::position::{ExitReason, Position, Side, TradeRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub fee_rate: f64,
    pub margin_fraction: f64,
    pub max_notional: Option<f64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            fee_rate: 0.001,
            margin_fraction: 0.9,
            max_notional: None,
        }
    }
}

pub fn calculate_fee(price: f64, quantity: f64, fee_rate: f64) -> f64 {
    price * quantity * fee_rate
}

/// Fee-adjusted profit of a round trip.
pub fn calculate_profit(side: Side, entry_price: f64, exit_price: f64, quantity: f64, fee_rate: f64) -> f64 {
    side.sign() * quantity * (exit_price - entry_price)
        - calculate_fee(entry_price, quantity, fee_rate)
        - calculate_fee(exit_price, quantity, fee_rate)
}

/// Where a pending entry gets filled.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFill {
    pub symbol: String,
    pub interval: String,
    pub side: Side,
    pub signal_timestamp: i64,
    pub timestamp: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered(Position),
    /// Non-finite or non-positive fill price.
    UnusablePrice,
    /// Nothing left to size with.
    InsufficientCapital,
}

/// Size and open a position against the current balance.
pub fn enter_position(account: &Account, fill: EntryFill, config: &ExecutionConfig) -> EntryResult {
    if !fill.price.is_finite() || fill.price <= 0.0 {
        return EntryResult::UnusablePrice;
    }

    let mut margin = account.balance * config.margin_fraction;
    if let Some(cap) = config.max_notional {
        margin = margin.min(cap);
    }
    if !margin.is_finite() || margin <= 0.0 {
        return EntryResult::InsufficientCapital;
    }

    let quantity = margin / fill.price;
    EntryResult::Entered(Position {
        symbol: fill.symbol,
        interval: fill.interval,
        side: fill.side,
        signal_timestamp: fill.signal_timestamp,
        entry_timestamp: fill.timestamp,
        entry_price: fill.price,
        quantity,
        margin,
        entry_fee: calculate_fee(fill.price, quantity, config.fee_rate),
        extreme: fill.price,
        bars_held: 0,
    })
}

/// Close `position`, settle it into `account` and return the ledger entry.
pub fn close_position<'a>(
    account: &'a mut Account,
    position: Position,
    exit_timestamp: i64,
    exit_price: f64,
    exit_reason: ExitReason,
    config: &ExecutionConfig,
) -> &'a TradeRecord {
    let exit_fee = calculate_fee(exit_price, position.quantity, config.fee_rate);
    let profit = calculate_profit(
        position.side,
        position.entry_price,
        exit_price,
        position.quantity,
        config.fee_rate,
    );
    let profit_pct = if position.margin > 0.0 {
        profit / position.margin * 100.0
    } else {
        0.0
    };

    let balance_after = account.balance + profit;
    account.record(TradeRecord {
        symbol: position.symbol,
        interval: position.interval,
        side: position.side,
        signal_timestamp: position.signal_timestamp,
        entry_timestamp: position.entry_timestamp,
        exit_timestamp,
        entry_price: position.entry_price,
        exit_price,
        quantity: position.quantity,
        margin: position.margin,
        entry_fee: position.entry_fee,
        exit_fee,
        profit,
        profit_pct,
        balance_after,
        exit_reason,
        bars_held: position.bars_held,
    })
}
