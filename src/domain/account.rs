//! Cash balance and trade ledger of one backtest run.

use super::position::TradeRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub initial_balance: f64,
    pub balance: f64,
    pub ledger: Vec<TradeRecord>,
}

impl Account {
    pub fn new(initial_balance: f64) -> Self {
        Account {
            initial_balance,
            balance: initial_balance,
            ledger: Vec::new(),
        }
    }

    /// Apply a closed trade: the balance moves by its profit exactly once and
    /// the record is appended to the ledger.
    pub fn record(&mut self, mut trade: TradeRecord) -> &TradeRecord {
        self.balance += trade.profit;
        trade.balance_after = self.balance;
        self.ledger.push(trade);
        &self.ledger[self.ledger.len() - 1]
    }

    pub fn trade_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn total_profit(&self) -> f64 {
        self.ledger.iter().map(|t| t.profit).sum()
    }

    pub fn is_below(&self, floor: f64) -> bool {
        self.balance < floor
    }
}
