//! End-to-end tests over the domain pipeline: normalize, compute factors,
//! select the universe, backtest and report.

mod common;

use approx::assert_relative_eq;
use common::*;
use klinetrader::cli::load_klines;
use klinetrader::domain::backtest::{BacktestConfig, Termination, run_backtest};
use klinetrader::domain::error::KlineTraderError;
use klinetrader::domain::execution::calculate_profit;
use klinetrader::domain::factor::{Factor, FactorConfig, FactorRef, compute_factors};
use klinetrader::domain::metrics::PerformanceReport;
use klinetrader::domain::panel::{FactorPanel, SeriesKey};
use klinetrader::domain::position::{ExitReason, Side};
use klinetrader::domain::rule_parser::parse;
use klinetrader::domain::strategy::Strategy;
use klinetrader::domain::universe::{Universe, select_universe};

fn strategy(rule: &str) -> Strategy {
    Strategy {
        entry_rule: parse(rule).unwrap(),
        ..Strategy::default()
    }
}

fn panel_from(klines: Vec<Kline>) -> FactorPanel {
    let source = MockKlineSource::new(&klines);
    let normalized = load_klines(&source).unwrap();
    compute_factors(normalized, &FactorConfig::default())
}

/// BTC rises for 75 bars then gaps down to 120; ETH falls throughout.
fn crash_panel() -> FactorPanel {
    let mut klines = rising("BTC", 75);
    klines.push(make_kline("BTC", 75, 120.0));
    klines.extend(falling("ETH", 80));
    panel_from(klines)
}

mod factors {
    use super::*;

    #[test]
    fn rising_hourly_bars_fill_indicators() {
        let panel = panel_from(rising("BTC", 70));
        let series = panel.find(&SeriesKey::new("BTC", "1h")).unwrap();

        for t in 65..70 {
            for factor in [Factor::Ma(5), Factor::Ma(20), Factor::Atr, Factor::Adx] {
                assert!(
                    series.value(FactorRef::current(factor), t).is_some(),
                    "{factor} null at {t}"
                );
            }
        }
        let roc = series.value(FactorRef::current(Factor::Roc(64)), 69).unwrap();
        assert!(roc > 0.0);
    }

    #[test]
    fn short_series_keeps_raw_columns_only() {
        let panel = panel_from(rising("BTC", 30));
        let series = &panel.series[0];
        assert_eq!(series.value(FactorRef::current(Factor::Close), 29), Some(129.0));
        assert_eq!(series.value(FactorRef::current(Factor::Ma(5)), 29), None);
        assert_eq!(series.value(FactorRef::current(Factor::Atr), 29), None);
    }

    #[test]
    fn malformed_numbers_become_null() {
        let klines = rising("BTC", 70);
        let mut source = MockKlineSource::new(&klines);
        source.records[40].close = "n/a".to_string();
        let panel = compute_factors(load_klines(&source).unwrap(), &FactorConfig::default());
        let series = &panel.series[0];

        assert_eq!(series.value(FactorRef::current(Factor::Close), 40), None);
        // MA5 at 41..=45 reads bar 40
        for t in 41..=45 {
            assert_eq!(series.value(FactorRef::current(Factor::Ma(5)), t), None);
        }
        assert!(series.value(FactorRef::current(Factor::Ma(5)), 46).is_some());
    }

    #[test]
    fn source_errors_propagate() {
        let source = MockKlineSource::new(&rising("BTC", 3)).with_error("connection reset");
        let err = load_klines(&source).unwrap_err();
        assert!(matches!(err, KlineTraderError::DataRead { reason, .. } if reason == "connection reset"));
    }

    #[test]
    fn empty_source_is_no_data() {
        let source = MockKlineSource::new(&[]);
        assert!(matches!(
            load_klines(&source),
            Err(KlineTraderError::NoData { interval: None })
        ));
    }
}

mod backtest {
    use super::*;

    #[test]
    fn gap_down_closes_long_at_open() {
        let panel = crash_panel();
        let config = BacktestConfig::default();
        let result = run_backtest(&panel, &strategy("ABOVE(roc64, 0)"), &config);

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.symbol, "BTC");
        assert_eq!(trade.side, Side::Long);
        assert_eq!(trade.signal_timestamp, timestamp_of(65));
        assert_eq!(trade.entry_timestamp, timestamp_of(66));
        assert_eq!(trade.entry_price, 165.5);
        assert_eq!(trade.exit_timestamp, timestamp_of(75));
        assert_eq!(trade.exit_price, 119.5);
        assert_eq!(trade.exit_reason, ExitReason::GapThroughStop);
        assert_eq!(trade.bars_held, 10);

        let quantity = 900.0 / 165.5;
        assert_relative_eq!(trade.quantity, quantity, epsilon = 1e-9);
        let expected = calculate_profit(Side::Long, 165.5, 119.5, quantity, 0.001);
        assert_relative_eq!(trade.profit, expected, epsilon = 1e-9);
        assert_relative_eq!(result.final_balance, 1000.0 + expected, epsilon = 1e-9);
        assert_eq!(result.termination, Termination::Completed);
        assert!(result.open_position.is_none());
    }

    #[test]
    fn signal_less_panel_changes_nothing() {
        let panel = crash_panel();
        let result = run_backtest(
            &panel,
            &strategy("ABOVE(roc64, 1000)"),
            &BacktestConfig::default(),
        );
        assert!(result.trades.is_empty());
        assert_eq!(result.final_balance, 1000.0);
        assert_eq!(result.windows, 80);
    }

    #[test]
    fn short_rides_falling_series() {
        let mut klines = rising("BTC", 80);
        klines.extend(falling("ETH", 80));
        let panel = panel_from(klines);
        let strategy = Strategy {
            side: Side::Short,
            ..strategy("BELOW(roc64, 0)")
        };
        let result = run_backtest(&panel, &strategy, &BacktestConfig::default());

        assert!(result.trades.is_empty());
        let open = result.open_position.expect("short still open");
        assert_eq!(open.symbol, "ETH");
        assert_eq!(open.side, Side::Short);
        assert_eq!(open.entry_timestamp, timestamp_of(66));
        assert_eq!(open.entry_price, 133.5);
        assert_eq!(open.history_low(), 120.0);
        assert_eq!(result.final_balance, 1000.0);
    }

    #[test]
    fn balance_matches_ledger() {
        let panel = crash_panel();
        let result = run_backtest(
            &panel,
            &strategy("ABOVE(roc64, 0)"),
            &BacktestConfig::default(),
        );
        let summed: f64 = result.trades.iter().map(|t| t.profit).sum();
        assert_relative_eq!(result.final_balance, 1000.0 + summed, epsilon = 1e-9);
        for pair in result.trades.windows(2) {
            assert!(pair[0].exit_timestamp <= pair[1].entry_timestamp);
        }
    }

    #[test]
    fn capital_floor_halts_run() {
        let panel = crash_panel();
        let config = BacktestConfig {
            initial_balance: 300.0,
            balance_floor: 250.0,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&panel, &strategy("ABOVE(roc64, 0)"), &config);
        assert!(matches!(
            result.termination,
            Termination::CapitalFloor { timestamp, .. } if timestamp == timestamp_of(75)
        ));
        assert_eq!(result.trades.len(), 1);
    }
}

mod universe {
    use super::*;

    #[test]
    fn symbol_filter_restricts_backtest() {
        let universe = Universe {
            symbols: vec!["ETH".into()],
            interval: Some("1h".into()),
        };
        let selection = select_universe(crash_panel(), &universe, 1).unwrap();
        assert_eq!(selection.panel.series_count(), 1);
        let result = run_backtest(
            &selection.panel,
            &strategy("ABOVE(roc64, 0)"),
            &BacktestConfig::default(),
        );
        assert!(result.trades.is_empty());
        assert!(result.open_position.is_none());
    }

    #[test]
    fn unknown_interval_is_no_data() {
        let universe = Universe {
            symbols: Vec::new(),
            interval: Some("4h".into()),
        };
        let err = select_universe(crash_panel(), &universe, 1).unwrap_err();
        assert!(matches!(err, KlineTraderError::NoData { .. }));
    }
}

mod report {
    use super::*;

    #[test]
    fn report_agrees_with_backtest() {
        let panel = crash_panel();
        let result = run_backtest(
            &panel,
            &strategy("ABOVE(roc64, 0)"),
            &BacktestConfig::default(),
        );
        let report =
            PerformanceReport::compute(result.initial_balance, &result.trades, &result.termination);

        assert_relative_eq!(report.final_balance, result.final_balance, epsilon = 1e-9);
        assert_eq!(report.equity_curve.len(), result.trades.len() + 1);
        assert_eq!(report.win_rate, 0.0);
        assert!(report.max_drawdown_pct < -20.0);
        assert_relative_eq!(report.largest_loss, result.trades[0].profit);
    }
}
