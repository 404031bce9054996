//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::adapters::csv_adapter::CsvKlineAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, Termination};
use crate::domain::config_validation::{
    validate_backtest_config, validate_factor_config, validate_strategy_config,
};
use crate::domain::error::KlineTraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::factor::{FactorConfig, FactorRef, compute_factors};
use crate::domain::kline::{Kline, normalize_all};
use crate::domain::metrics::PerformanceReport;
use crate::domain::position::Side;
use crate::domain::rule_parser;
use crate::domain::strategy::{DEFAULT_ENTRY_RULE, ExitParams, Strategy};
use crate::domain::universe::{Universe, parse_symbols, select_universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::KlineSource;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "klinetrader", about = "Kline factor engine and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over a kline panel
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Kline panel CSV
        #[arg(short, long)]
        data: PathBuf,
        /// Report directory
        #[arg(short, long, default_value = "report")]
        output: PathBuf,
        /// Override `[backtest] interval`
        #[arg(long)]
        interval: Option<String>,
        /// Override `[backtest] symbols` (comma separated)
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Compute the factor panel and write it as CSV
    Factors {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Optional config for the `[factors]` section
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            interval,
            symbols,
        } => run_backtest(
            &config,
            &data,
            &output,
            interval.as_deref(),
            symbols.as_deref(),
        ),
        Command::Factors {
            data,
            output,
            config,
        } => run_factors(&data, &output, config.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, KlineTraderError> {
    info!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

fn validate_all(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    validate_backtest_config(config)?;
    validate_factor_config(config)?;
    validate_strategy_config(config)
}

fn get_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    usize::try_from(config.get_int(section, key, default as i64)).unwrap_or(default)
}

pub fn build_factor_config(config: &dyn ConfigPort) -> FactorConfig {
    let d = FactorConfig::default();
    FactorConfig {
        min_lookback: get_usize(config, "factors", "min_lookback", d.min_lookback),
        atr_period: get_usize(config, "factors", "atr_period", d.atr_period),
        adx_period: get_usize(config, "factors", "adx_period", d.adx_period),
        bollinger_period: get_usize(config, "factors", "bollinger_period", d.bollinger_period),
        bollinger_mult: config.get_double("factors", "bollinger_mult", d.bollinger_mult),
        donchian_period: get_usize(config, "factors", "donchian_period", d.donchian_period),
    }
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> BacktestConfig {
    let d = BacktestConfig::default();
    let exec = ExecutionConfig::default();
    let max_notional = config
        .get_string("backtest", "max_notional")
        .map(|_| config.get_double("backtest", "max_notional", f64::NAN))
        .filter(|v| v.is_finite() && *v > 0.0);

    BacktestConfig {
        initial_balance: config.get_double("backtest", "initial_balance", d.initial_balance),
        balance_floor: config.get_double("backtest", "balance_floor", d.balance_floor),
        warmup_windows: get_usize(config, "backtest", "warmup_windows", d.warmup_windows),
        execution: ExecutionConfig {
            fee_rate: config.get_double("backtest", "fee_rate", exec.fee_rate),
            margin_fraction: config.get_double("backtest", "margin_fraction", exec.margin_fraction),
            max_notional,
        },
    }
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, KlineTraderError> {
    let d = Strategy::default();

    let side = match config.get_string("strategy", "side") {
        Some(s) => s
            .parse::<Side>()
            .map_err(|reason| KlineTraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "side".into(),
                reason,
            })?,
        None => d.side,
    };

    let rank_by = match config.get_string("strategy", "rank_by") {
        Some(s) => s
            .trim()
            .parse::<FactorRef>()
            .map_err(|e| KlineTraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "rank_by".into(),
                reason: e.to_string(),
            })?,
        None => d.rank_by,
    };

    let entry_rule = match config
        .get_string("strategy", "entry_rule")
        .filter(|s| !s.trim().is_empty())
    {
        Some(text) => rule_parser::parse(&text).map_err(|e| {
            error!(
                "failed to parse entry_rule:\n{}",
                e.display_with_context(&text)
            );
            KlineTraderError::from(e)
        })?,
        None => d.entry_rule,
    };

    let cap = config.get_double("strategy", "atr_cap_pct", 3.0);
    let exit = ExitParams {
        atr_multiplier: config.get_double("strategy", "atr_multiplier", d.exit.atr_multiplier),
        atr_cap_pct: (cap > 0.0).then_some(cap),
    };

    Ok(Strategy {
        name: config.get_string("strategy", "name").unwrap_or(d.name),
        description: config
            .get_string("strategy", "description")
            .unwrap_or(d.description),
        side,
        rank_by,
        top_n: get_usize(config, "strategy", "top_n", d.top_n),
        entry_rule,
        exit,
    })
}

pub fn build_universe(
    config: &dyn ConfigPort,
    interval_override: Option<&str>,
    symbols_override: Option<&str>,
) -> Result<Universe, KlineTraderError> {
    let symbols = match symbols_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "symbols"))
        .filter(|s| !s.trim().is_empty())
    {
        Some(s) => parse_symbols(&s).map_err(|e| KlineTraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "symbols".into(),
            reason: e.to_string(),
        })?,
        None => Vec::new(),
    };

    let interval = interval_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "interval"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(Universe { symbols, interval })
}

/// Fetch and normalize every kline the source holds.
pub fn load_klines(source: &dyn KlineSource) -> Result<Vec<Kline>, KlineTraderError> {
    info!("Reading klines from {}", source.describe());
    let raws = source.fetch_klines()?;
    let (klines, dropped) = normalize_all(&raws);
    if dropped > 0 {
        warn!("Dropped {} rows without a usable symbol, interval or timestamp", dropped);
    }
    let malformed = klines.iter().filter(|k| !k.is_well_formed()).count();
    if malformed > 0 {
        debug!("{} klines carry non-numeric fields", malformed);
    }
    if klines.is_empty() {
        return Err(KlineTraderError::NoData { interval: None });
    }
    info!("Loaded {} klines", klines.len());
    Ok(klines)
}

fn run_backtest(
    config_path: &Path,
    data_path: &Path,
    output_dir: &Path,
    interval_override: Option<&str>,
    symbols_override: Option<&str>,
) -> Result<(), KlineTraderError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;

    let factor_config = build_factor_config(&adapter);
    let bt_config = build_backtest_config(&adapter);
    let strategy = build_strategy(&adapter)?;
    let universe = build_universe(&adapter, interval_override, symbols_override)?;
    info!("Loaded strategy: {}", strategy.name);

    let klines = load_klines(&CsvKlineAdapter::new(data_path))?;

    let started = Instant::now();
    let panel = compute_factors(klines, &factor_config);
    info!(
        "Computed factors for {} series ({} rows) in {:.2?}",
        panel.series_count(),
        panel.row_count(),
        started.elapsed()
    );

    let min_bars = get_usize(&adapter, "backtest", "min_bars", 1);
    let selection = select_universe(panel, &universe, min_bars)?;

    let result = backtest_engine::run_backtest(&selection.panel, &strategy, &bt_config);
    let report = PerformanceReport::compute(result.initial_balance, &result.trades, &result.termination);

    eprintln!("\n=== Results ===");
    eprintln!("Final Balance:    {:.2}", report.final_balance);
    eprintln!("Total Return:     {:.2}%", report.total_return_pct);
    eprintln!("Max Drawdown:     {:.2}%", report.max_drawdown_pct);
    eprintln!("Total Trades:     {}", report.total_trades);
    eprintln!("Win Rate:         {:.1}%", report.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", report.profit_factor);
    if let Termination::CapitalFloor { balance, .. } = report.termination {
        eprintln!("Halted:           balance {:.2} below floor", balance);
    }
    if let Some(p) = &result.open_position {
        eprintln!("Open Position:    {} {} @ {}", p.side, p.symbol, p.entry_price);
        if let Some(pnl) = result.unrealized_pnl() {
            eprintln!("Unrealized P&L:   {:.2}", pnl);
        }
    }

    let reporter = CsvReportAdapter::new(output_dir);
    reporter.write_backtest(&report, &result, &strategy)?;
    eprintln!("\nReport written to: {}", output_dir.display());
    Ok(())
}

fn run_factors(
    data_path: &Path,
    output_path: &Path,
    config_path: Option<&Path>,
) -> Result<(), KlineTraderError> {
    let factor_config = match config_path {
        Some(path) => {
            let adapter = load_config(path)?;
            validate_factor_config(&adapter)?;
            build_factor_config(&adapter)
        }
        None => FactorConfig::default(),
    };

    let klines = load_klines(&CsvKlineAdapter::new(data_path))?;
    let panel = compute_factors(klines, &factor_config);

    CsvReportAdapter::new(".")
        .with_factors_path(output_path)
        .write_factor_panel(&panel)
}

fn run_validate(config_path: &Path) -> Result<(), KlineTraderError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;
    let strategy = build_strategy(&adapter)?;
    let universe = build_universe(&adapter, None, None)?;
    let bt_config = build_backtest_config(&adapter);

    let rule_text = adapter
        .get_string("strategy", "entry_rule")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENTRY_RULE.to_string());

    eprintln!("\nStrategy: {} ({})", strategy.name, strategy.side);
    eprintln!("  Rank by:    {} (top {})", strategy.rank_by, strategy.top_n);
    eprintln!("  Entry rule: {}", rule_text);
    eprintln!("  Lookback:   {} bars", strategy.entry_rule.lookback());
    let columns: Vec<String> = strategy
        .audit_columns()
        .iter()
        .map(|c| c.to_string())
        .collect();
    eprintln!("  Columns:    {}", columns.join(", "));
    eprintln!(
        "  Exit:       {} x ATR{}",
        strategy.exit.atr_multiplier,
        strategy
            .exit
            .atr_cap_pct
            .map(|c| format!(", capped at {c}% of entry"))
            .unwrap_or_default()
    );

    eprintln!("\nUniverse:");
    eprintln!(
        "  interval: {}",
        universe.interval.as_deref().unwrap_or("(all)")
    );
    if universe.is_unrestricted() {
        eprintln!("  symbols:  (all)");
    } else {
        eprintln!("  symbols:  {}", universe.symbols.join(", "));
    }
    eprintln!(
        "\nBalance {} (floor {}), fee {}, margin {}",
        bt_config.initial_balance,
        bt_config.balance_floor,
        bt_config.execution.fee_rate,
        bt_config.execution.margin_fraction
    );

    eprintln!("\nConfiguration is valid.");
    Ok(())
}
