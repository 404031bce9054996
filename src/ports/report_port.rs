//! Report output port.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::KlineTraderError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::panel::FactorPanel;
use crate::domain::strategy::Strategy;

pub trait ReportPort {
    fn write_factor_panel(&self, panel: &FactorPanel) -> Result<(), KlineTraderError>;

    fn write_ledger(&self, result: &BacktestResult) -> Result<(), KlineTraderError>;

    fn write_summary(
        &self,
        report: &PerformanceReport,
        result: &BacktestResult,
        strategy: &Strategy,
    ) -> Result<(), KlineTraderError>;

    /// Ledger and summary together.
    fn write_backtest(
        &self,
        report: &PerformanceReport,
        result: &BacktestResult,
        strategy: &Strategy,
    ) -> Result<(), KlineTraderError> {
        self.write_ledger(result)?;
        self.write_summary(report, result, strategy)
    }
}
