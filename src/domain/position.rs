//! Open position and closed trade records.

use crate::domain::kline::Kline;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            other => Err(format!("expected 'long' or 'short', got '{other}'")),
        }
    }
}

/// The single open trade of a backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub interval: String,
    pub side: Side,
    pub signal_timestamp: i64,
    pub entry_timestamp: i64,
    pub entry_price: f64,
    pub quantity: f64,
    pub margin: f64,
    pub entry_fee: f64,
    /// Running high (long) or low (short) since entry, seeded with the entry
    /// price and folded through the last bar already checked for exit.
    pub extreme: f64,
    pub bars_held: usize,
}

impl Position {
    pub fn history_high(&self) -> f64 {
        self.extreme
    }

    pub fn history_low(&self) -> f64 {
        self.extreme
    }

    /// Fold a bar's high (long) or low (short) into the running extreme.
    /// Non-finite prices are ignored.
    pub fn update_extreme(&mut self, kline: &Kline) {
        match self.side {
            Side::Long if kline.high.is_finite() => self.extreme = self.extreme.max(kline.high),
            Side::Short if kline.low.is_finite() => self.extreme = self.extreme.min(kline.low),
            _ => {}
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Mark-to-market profit before exit fees.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * self.quantity * (price - self.entry_price) - self.entry_fee
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The bar traded through the trailing stop; filled at the stop.
    TrailingStop,
    /// The bar opened beyond the stop; filled at the open.
    GapThroughStop,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TrailingStop => write!(f, "trailing_stop"),
            ExitReason::GapThroughStop => write!(f, "gap_through_stop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub symbol: String,
    pub interval: String,
    pub side: Side,
    pub signal_timestamp: i64,
    pub entry_timestamp: i64,
    pub exit_timestamp: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub margin: f64,
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub profit: f64,
    pub profit_pct: f64,
    pub balance_after: f64,
    pub exit_reason: ExitReason,
    pub bars_held: usize,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }

    pub fn total_fees(&self) -> f64 {
        self.entry_fee + self.exit_fee
    }
}
