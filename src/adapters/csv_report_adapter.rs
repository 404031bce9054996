//! CSV report adapter: factor panel, trade ledger, equity curve and summary.

use crate::domain::backtest::{BacktestResult, Termination};
use crate::domain::error::KlineTraderError;
use crate::domain::factor::export_columns;
use crate::domain::metrics::PerformanceReport;
use crate::domain::panel::FactorPanel;
use crate::domain::strategy::Strategy;
use crate::ports::report_port::ReportPort;
use chrono::DateTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const FACTORS_FILE: &str = "factors.csv";
pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

pub struct CsvReportAdapter {
    factors_path: PathBuf,
    trades_path: PathBuf,
    equity_path: PathBuf,
    summary_path: PathBuf,
}

impl CsvReportAdapter {
    /// Every report goes under `output_dir` with its default file name.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        let dir = output_dir.as_ref();
        Self {
            factors_path: dir.join(FACTORS_FILE),
            trades_path: dir.join(TRADES_FILE),
            equity_path: dir.join(EQUITY_FILE),
            summary_path: dir.join(SUMMARY_FILE),
        }
    }

    pub fn with_factors_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.factors_path = path.into();
        self
    }

    pub fn trades_path(&self) -> &Path {
        &self.trades_path
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }
}

/// `YYYY-MM-DD HH:MM:SS` (UTC) for a ms epoch, or the raw number when out of range.
pub fn format_timestamp(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_fixed(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

fn write_file<F>(path: &Path, render: F) -> Result<(), KlineTraderError>
where
    F: FnOnce(&mut csv::Writer<fs::File>) -> csv::Result<()>,
{
    let to_err = |reason: String| KlineTraderError::ReportWrite {
        target: path.display().to_string(),
        reason,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| to_err(e.to_string()))?;
    }
    let mut wtr = csv::Writer::from_path(path).map_err(|e| to_err(e.to_string()))?;
    render(&mut wtr).map_err(|e| to_err(e.to_string()))?;
    wtr.flush().map_err(|e| to_err(e.to_string()))?;
    Ok(())
}

pub fn render_factor_panel<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    panel: &FactorPanel,
) -> csv::Result<()> {
    let columns = export_columns();
    let mut header = vec![
        "symbol".to_string(),
        "interval".to_string(),
        "timestamp".to_string(),
        "datetime".to_string(),
    ];
    header.extend(columns.iter().map(|c| c.to_string()));
    wtr.write_record(&header)?;

    for series in &panel.series {
        for index in 0..series.len() {
            let row = series.row(index);
            let mut record = vec![
                row.symbol().to_string(),
                row.interval().to_string(),
                row.timestamp().to_string(),
                format_timestamp(row.timestamp()),
            ];
            record.extend(columns.iter().map(|c| fmt_opt(row.value(*c))));
            wtr.write_record(&record)?;
        }
    }
    Ok(())
}

pub fn render_ledger<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    result: &BacktestResult,
) -> csv::Result<()> {
    wtr.write_record([
        "symbol",
        "interval",
        "side",
        "signal_time",
        "entry_time",
        "exit_time",
        "entry_price",
        "exit_price",
        "quantity",
        "margin",
        "entry_fee",
        "exit_fee",
        "profit",
        "profit_pct",
        "balance_after",
        "exit_reason",
        "bars_held",
    ])?;

    for t in &result.trades {
        wtr.write_record([
            &t.symbol,
            &t.interval,
            &t.side.to_string(),
            &format_timestamp(t.signal_timestamp),
            &format_timestamp(t.entry_timestamp),
            &format_timestamp(t.exit_timestamp),
            &t.entry_price.to_string(),
            &t.exit_price.to_string(),
            &format!("{:.8}", t.quantity),
            &format!("{:.4}", t.margin),
            &format!("{:.6}", t.entry_fee),
            &format!("{:.6}", t.exit_fee),
            &format!("{:.6}", t.profit),
            &format!("{:.4}", t.profit_pct),
            &format!("{:.6}", t.balance_after),
            &t.exit_reason.to_string(),
            &t.bars_held.to_string(),
        ])?;
    }
    Ok(())
}

pub fn render_equity<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    report: &PerformanceReport,
) -> csv::Result<()> {
    wtr.write_record(["time", "balance", "peak", "drawdown_pct"])?;
    for p in &report.equity_curve {
        wtr.write_record([
            &format_timestamp(p.timestamp),
            &format!("{:.6}", p.balance),
            &format!("{:.6}", p.peak),
            &format!("{:.4}", p.drawdown_pct),
        ])?;
    }
    Ok(())
}

pub fn render_summary<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    report: &PerformanceReport,
    result: &BacktestResult,
    strategy: &Strategy,
) -> csv::Result<()> {
    let termination = match &report.termination {
        Termination::Completed => "completed".to_string(),
        Termination::CapitalFloor { timestamp, balance } => format!(
            "capital_floor at {} (balance {:.4})",
            format_timestamp(*timestamp),
            balance
        ),
    };
    let open_position = result
        .open_position
        .as_ref()
        .map(|p| format!("{} {} @ {}", p.side, p.symbol, p.entry_price))
        .unwrap_or_default();

    let rows: Vec<(&str, String)> = vec![
        ("strategy", strategy.name.clone()),
        ("side", strategy.side.to_string()),
        ("rank_by", strategy.rank_by.to_string()),
        ("top_n", strategy.top_n.to_string()),
        ("windows", result.windows.to_string()),
        ("signals", result.signals.to_string()),
        ("initial_balance", format!("{:.4}", report.initial_balance)),
        ("final_balance", format!("{:.4}", report.final_balance)),
        ("total_profit", format!("{:.4}", report.total_profit)),
        ("total_return_pct", format!("{:.4}", report.total_return_pct)),
        ("total_trades", report.total_trades.to_string()),
        ("trades_won", report.trades_won.to_string()),
        ("trades_lost", report.trades_lost.to_string()),
        ("win_rate", format!("{:.4}", report.win_rate)),
        ("avg_profit", format!("{:.4}", report.avg_profit)),
        ("largest_win", format!("{:.4}", report.largest_win)),
        ("largest_loss", format!("{:.4}", report.largest_loss)),
        ("profit_factor", format!("{:.4}", report.profit_factor)),
        ("max_drawdown_pct", format!("{:.4}", report.max_drawdown_pct)),
        ("avg_bars_held", format!("{:.2}", report.avg_bars_held)),
        ("total_fees", format!("{:.4}", report.total_fees)),
        ("termination", termination),
        ("open_position", open_position),
        ("open_market_value", fmt_fixed(result.open_market_value())),
        ("unrealized_pnl", fmt_fixed(result.unrealized_pnl())),
    ];

    wtr.write_record(["metric", "value"])?;
    for (key, value) in rows {
        wtr.write_record([key, value.as_str()])?;
    }
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write_factor_panel(&self, panel: &FactorPanel) -> Result<(), KlineTraderError> {
        write_file(&self.factors_path, |w| render_factor_panel(w, panel))?;
        info!(
            "Wrote {} factor rows to {}",
            panel.row_count(),
            self.factors_path.display()
        );
        Ok(())
    }

    fn write_ledger(&self, result: &BacktestResult) -> Result<(), KlineTraderError> {
        write_file(&self.trades_path, |w| render_ledger(w, result))?;
        info!(
            "Wrote {} trades to {}",
            result.trades.len(),
            self.trades_path.display()
        );
        Ok(())
    }

    fn write_summary(
        &self,
        report: &PerformanceReport,
        result: &BacktestResult,
        strategy: &Strategy,
    ) -> Result<(), KlineTraderError> {
        write_file(&self.equity_path, |w| render_equity(w, report))?;
        write_file(&self.summary_path, |w| render_summary(w, report, result, strategy))?;
        info!("Wrote summary to {}", self.summary_path.display());
        Ok(())
    }
}
