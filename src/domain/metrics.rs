//! Performance statistics over a trade ledger.

use super::backtest::Termination;
use super::position::TradeRecord;

/// One point of the balance curve. The first point is the initial balance,
/// stamped with the first trade's entry time (0 without trades).
#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub balance: f64,
    pub peak: f64,
    /// (balance - peak) / peak * 100, never positive.
    pub drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_profit: f64,
    /// Percent of the initial balance.
    pub total_return_pct: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    /// Fraction of trades with a positive profit.
    pub win_rate: f64,
    pub avg_profit: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    /// Most negative drawdown, in percent.
    pub max_drawdown_pct: f64,
    pub avg_bars_held: f64,
    pub total_fees: f64,
    pub termination: Termination,
    pub equity_curve: Vec<EquityPoint>,
}

impl PerformanceReport {
    pub fn compute(initial_balance: f64, trades: &[TradeRecord], termination: &Termination) -> Self {
        let equity_curve = compute_equity_curve(initial_balance, trades);
        let final_balance = equity_curve
            .last()
            .map(|p| p.balance)
            .unwrap_or(initial_balance);
        let total_profit: f64 = trades.iter().map(|t| t.profit).sum();

        let total_return_pct = if initial_balance > 0.0 {
            (final_balance - initial_balance) / initial_balance * 100.0
        } else {
            0.0
        };

        let max_drawdown_pct = equity_curve
            .iter()
            .map(|p| p.drawdown_pct)
            .fold(0.0_f64, f64::min);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in trades {
            let profit = trade.profit;
            if profit > 0.0 {
                trades_won += 1;
                total_wins += profit;
                largest_win = largest_win.max(profit);
            } else if profit < 0.0 {
                trades_lost += 1;
                total_losses += profit.abs();
                largest_loss = largest_loss.min(profit);
            }
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let avg_profit = if total_trades > 0 {
            total_profit / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_bars_held = if total_trades > 0 {
            trades.iter().map(|t| t.bars_held as f64).sum::<f64>() / total_trades as f64
        } else {
            0.0
        };

        PerformanceReport {
            initial_balance,
            final_balance,
            total_profit,
            total_return_pct,
            total_trades,
            trades_won,
            trades_lost,
            win_rate,
            avg_profit,
            largest_win,
            largest_loss,
            profit_factor,
            max_drawdown_pct,
            avg_bars_held,
            total_fees: trades.iter().map(TradeRecord::total_fees).sum(),
            termination: termination.clone(),
            equity_curve,
        }
    }
}

/// Cumulative balance after each trade with its running peak and drawdown.
pub fn compute_equity_curve(initial_balance: f64, trades: &[TradeRecord]) -> Vec<EquityPoint> {
    let start = trades.first().map(|t| t.entry_timestamp).unwrap_or(0);
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut balance = initial_balance;
    let mut peak = initial_balance;

    curve.push(point(start, balance, peak));
    for trade in trades {
        balance += trade.profit;
        peak = peak.max(balance);
        curve.push(point(trade.exit_timestamp, balance, peak));
    }
    curve
}

fn point(timestamp: i64, balance: f64, peak: f64) -> EquityPoint {
    let drawdown_pct = if peak > 0.0 {
        (balance - peak) / peak * 100.0
    } else {
        0.0
    };
    EquityPoint {
        timestamp,
        balance,
        peak,
        drawdown_pct,
    }
}
