//! Backtest engine and event loop.
//!
//! The engine walks the ascending distinct timestamps of a factor panel and
//! drives a single position slot through `Idle -> PendingEntry -> Open ->
//! Idle`. At each window, in order:
//!
//! 1. a pending entry fills at the open of the signalled series' bar; when
//!    that series has no bar in the window right after the signal, the entry
//!    is cancelled
//! 2. an open position (including one filled in step 1) is checked against
//!    the trailing stop, using the running extreme through the previous bar;
//!    without an exit the bar's high (low for shorts) is folded in
//! 3. if the slot is idle once pending entries are settled, the slice is
//!    scanned for an open signal
//!
//! A trade that leaves the balance under `balance_floor` ends the run.

use crate::domain::account::Account;
use crate::domain::execution::{
    EntryFill, EntryResult, ExecutionConfig, close_position, enter_position,
};
use crate::domain::panel::{FactorPanel, FactorRow};
use crate::domain::position::{Position, TradeRecord};
use crate::domain::signal::{OpenSignal, generate_close_signal, generate_open_signal};
use crate::domain::strategy::Strategy;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    pub balance_floor: f64,
    /// Leading time windows skipped before any signal is considered.
    pub warmup_windows: usize,
    pub execution: ExecutionConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1000.0,
            balance_floor: 100.0,
            warmup_windows: 0,
            execution: ExecutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Every time window was processed.
    Completed,
    /// A trade left the balance under the floor.
    CapitalFloor { timestamp: i64, balance: f64 },
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Idle,
    PendingEntry(OpenSignal),
    Open(Position),
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub trades: Vec<TradeRecord>,
    pub termination: Termination,
    /// Windows visited, warmup excluded.
    pub windows: usize,
    pub signals: usize,
    /// Position still open when the walk ended; not settled.
    pub open_position: Option<Position>,
    /// Last close seen for the open position's series.
    pub mark_price: Option<f64>,
    /// Signal still waiting for its entry bar when the walk ended.
    pub pending_entry: Option<OpenSignal>,
}

impl BacktestResult {
    pub fn total_profit(&self) -> f64 {
        self.trades.iter().map(|t| t.profit).sum()
    }

    /// Mark-to-market profit of the open position at `mark_price`.
    pub fn unrealized_pnl(&self) -> Option<f64> {
        let position = self.open_position.as_ref()?;
        self.mark_price.map(|price| position.unrealized_pnl(price))
    }

    pub fn open_market_value(&self) -> Option<f64> {
        let position = self.open_position.as_ref()?;
        self.mark_price.map(|price| position.market_value(price))
    }
}

fn row_for<'a>(slice: &[FactorRow<'a>], symbol: &str, interval: &str) -> Option<FactorRow<'a>> {
    slice
        .iter()
        .find(|r| r.symbol() == symbol && r.interval() == interval)
        .copied()
}

pub fn run_backtest(panel: &FactorPanel, strategy: &Strategy, config: &BacktestConfig) -> BacktestResult {
    let windows = panel.time_windows();
    info!(
        "Running backtest over {} windows and {} series (strategy: {})",
        windows.len().saturating_sub(config.warmup_windows),
        panel.series_count(),
        strategy.name
    );

    let mut account = Account::new(config.initial_balance);
    let mut slot = Slot::Idle;
    let mut termination = Termination::Completed;
    let mut visited = 0usize;
    let mut signals = 0usize;
    let mut mark_price: Option<f64> = None;

    for &timestamp in windows.iter().skip(config.warmup_windows) {
        visited += 1;
        let slice = panel.slice(timestamp);
        if let Slot::PendingEntry(signal) = &slot {
            let next = match row_for(&slice, &signal.symbol, &signal.interval) {
                Some(row) => {
                    let fill = EntryFill {
                        symbol: signal.symbol.clone(),
                        interval: signal.interval.clone(),
                        side: signal.side,
                        signal_timestamp: signal.timestamp,
                        timestamp,
                        price: row.kline().open,
                    };
                    match enter_position(&account, fill, &config.execution) {
                        EntryResult::Entered(position) => {
                            debug!(
                                "Entered {} {} at {} (qty {:.6}, margin {:.2})",
                                position.side,
                                position.symbol,
                                position.entry_price,
                                position.quantity,
                                position.margin
                            );
                            Slot::Open(position)
                        }
                        EntryResult::UnusablePrice => {
                            warn!(
                                "Cancelled entry into {} at {}: unusable open price",
                                signal.symbol, timestamp
                            );
                            Slot::Idle
                        }
                        EntryResult::InsufficientCapital => {
                            warn!(
                                "Cancelled entry into {} at {}: insufficient capital",
                                signal.symbol, timestamp
                            );
                            Slot::Idle
                        }
                    }
                }
                None => {
                    warn!(
                        "Cancelled entry into {} at {}: no bar in the window after the signal",
                        signal.symbol, timestamp
                    );
                    Slot::Idle
                }
            };
            slot = next;
        }

        // A position closed in step 2 waits for the next window.
        let scan_for_entry = slot == Slot::Idle;

        if let Slot::Open(position) = &mut slot {
            if let Some(row) = row_for(&slice, &position.symbol, &position.interval) {
                position.bars_held += 1;
                mark_price = Some(row.kline().close);
                match generate_close_signal(position, &row, &strategy.exit) {
                    Some(close) => {
                        let position = position.clone();
                        let trade = close_position(
                            &mut account,
                            position,
                            timestamp,
                            close.exit_price,
                            close.reason,
                            &config.execution,
                        );
                        debug!(
                            "Closed {} {} at {} ({}): profit {:.4}, balance {:.4}",
                            trade.side,
                            trade.symbol,
                            trade.exit_price,
                            trade.exit_reason,
                            trade.profit,
                            trade.balance_after
                        );
                        slot = Slot::Idle;

                        if account.is_below(config.balance_floor) {
                            warn!(
                                "Balance {:.4} fell below floor {} at {}; halting",
                                account.balance, config.balance_floor, timestamp
                            );
                            termination = Termination::CapitalFloor {
                                timestamp,
                                balance: account.balance,
                            };
                            break;
                        }
                    }
                    None => position.update_extreme(row.kline()),
                }
            }
        }

        if scan_for_entry {
            if let Some(signal) = generate_open_signal(&slice, strategy) {
                debug!(
                    "Open signal {} {} at {} (rank {:.4})",
                    signal.symbol, signal.interval, signal.timestamp, signal.rank_value
                );
                signals += 1;
                slot = Slot::PendingEntry(signal);
            }
        }
    }

    let (open_position, pending_entry) = match slot {
        Slot::Idle => (None, None),
        Slot::PendingEntry(signal) => (None, Some(signal)),
        Slot::Open(position) => (Some(position), None),
    };

    info!(
        "Backtest finished: {} trades, net profit {:.4}, final balance {:.4}",
        account.trade_count(),
        account.total_profit(),
        account.balance
    );
    let mark_price = open_position.as_ref().and(mark_price);

    BacktestResult {
        initial_balance: account.initial_balance,
        final_balance: account.balance,
        trades: account.ledger,
        termination,
        windows: visited,
        signals,
        open_position,
        mark_price,
        pending_entry,
    }
}
