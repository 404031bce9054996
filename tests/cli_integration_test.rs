//! CLI integration tests.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, build_strategy, build_universe)
//! - Exit code mapping of the error taxonomy
//! - The backtest, factors and validate commands against files on disk

mod common;

use clap::Parser;
use common::*;
use klinetrader::adapters::file_config_adapter::FileConfigAdapter;
use klinetrader::cli::{self, Cli};
use klinetrader::domain::backtest::BacktestConfig;
use klinetrader::domain::error::{KlineTraderError, ParseError};
use klinetrader::domain::factor::{Factor, FactorConfig, FactorRef};
use klinetrader::domain::position::Side;
use klinetrader::domain::strategy::ExitParams;
use klinetrader::domain::universe::Universe;
use std::fs;
use std::process::ExitCode;
use tempfile::TempDir;

const VALID_INI: &str = r#"
[backtest]
initial_balance = 1000
balance_floor = 100
fee_rate = 0.001
margin_fraction = 0.9
interval = 1h

[factors]
min_lookback = 65

[strategy]
name = momentum
side = long
rank_by = roc64
top_n = 30
atr_multiplier = 0.7
atr_cap_pct = 3
entry_rule = ABOVE(roc64, 0)
"#;

fn exit_code_text(code: ExitCode) -> String {
    format!("{code:?}")
}

fn crash_klines() -> Vec<Kline> {
    let mut klines = rising("BTC", 75);
    klines.push(make_kline("BTC", 75, 120.0));
    klines.extend(falling("ETH", 80));
    klines
}

mod config_loading {
    use super::*;

    #[test]
    fn defaults_from_empty_config() {
        let adapter = FileConfigAdapter::from_string("").unwrap();
        assert_eq!(cli::build_factor_config(&adapter), FactorConfig::default());
        assert_eq!(cli::build_backtest_config(&adapter), BacktestConfig::default());
        let strategy = cli::build_strategy(&adapter).unwrap();
        assert_eq!(strategy.name, "momentum");
        assert_eq!(strategy.exit, ExitParams::default());
        assert_eq!(
            cli::build_universe(&adapter, None, None).unwrap(),
            Universe::default()
        );
    }

    #[test]
    fn backtest_config_custom_values() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\ninitial_balance = 5000\nbalance_floor = 500\nwarmup_windows = 96\n\
             fee_rate = 0.0004\nmargin_fraction = 0.5\nmax_notional = 1000\n",
        )
        .unwrap();
        let config = cli::build_backtest_config(&adapter);
        assert_eq!(config.initial_balance, 5000.0);
        assert_eq!(config.balance_floor, 500.0);
        assert_eq!(config.warmup_windows, 96);
        assert_eq!(config.execution.fee_rate, 0.0004);
        assert_eq!(config.execution.margin_fraction, 0.5);
        assert_eq!(config.execution.max_notional, Some(1000.0));
    }

    #[test]
    fn factor_config_custom_values() {
        let adapter =
            FileConfigAdapter::from_string("[factors]\natr_period = 10\nbollinger_mult = 2.5\n")
                .unwrap();
        let config = cli::build_factor_config(&adapter);
        assert_eq!(config.atr_period, 10);
        assert_eq!(config.bollinger_mult, 2.5);
        assert_eq!(config.min_lookback, 65);
    }

    #[test]
    fn universe_overrides_win() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninterval = 1h\nsymbols = btcusdt,ethusdt\n")
                .unwrap();
        let u = cli::build_universe(&adapter, None, None).unwrap();
        assert_eq!(u.interval.as_deref(), Some("1h"));
        assert_eq!(u.symbols, vec!["BTCUSDT", "ETHUSDT"]);

        let u = cli::build_universe(&adapter, Some("4h"), Some("solusdt")).unwrap();
        assert_eq!(u.interval.as_deref(), Some("4h"));
        assert_eq!(u.symbols, vec!["SOLUSDT"]);
    }
}

mod strategy_parsing {
    use super::*;

    #[test]
    fn strategy_from_config() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\nname = breakout\nside = short\nrank_by = roc16_pre1\ntop_n = 5\n\
             atr_multiplier = 1.5\natr_cap_pct = 0\nentry_rule = ABOVE(adx, 25)\n",
        )
        .unwrap();
        let strategy = cli::build_strategy(&adapter).unwrap();
        assert_eq!(strategy.name, "breakout");
        assert_eq!(strategy.side, Side::Short);
        assert_eq!(strategy.rank_by, FactorRef::lagged(Factor::Roc(16), 1));
        assert_eq!(strategy.top_n, 5);
        assert_eq!(strategy.exit.atr_multiplier, 1.5);
        assert_eq!(strategy.exit.atr_cap_pct, None);
        assert_eq!(
            strategy.audit_columns(),
            vec![
                FactorRef::lagged(Factor::Roc(16), 1),
                FactorRef::current(Factor::Adx)
            ]
        );
    }

    #[test]
    fn bad_rule_is_a_parse_error() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nentry_rule = ABOVE(close,\n").unwrap();
        let err = cli::build_strategy(&adapter).unwrap_err();
        assert!(matches!(err, KlineTraderError::RuleParse(_)));
    }

    #[test]
    fn bad_side_is_a_config_error() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nside = sideways\n").unwrap();
        let err = cli::build_strategy(&adapter).unwrap_err();
        assert!(matches!(err, KlineTraderError::ConfigInvalid { key, .. } if key == "side"));
    }
}

mod exit_codes {
    use super::*;

    #[test]
    fn taxonomy_maps_to_codes() {
        let cases = [
            (
                KlineTraderError::ReportWrite {
                    target: "x".into(),
                    reason: "y".into(),
                },
                1u8,
            ),
            (
                KlineTraderError::ConfigMissing {
                    section: "strategy".into(),
                    key: "entry_rule".into(),
                },
                2,
            ),
            (
                KlineTraderError::DataRead {
                    source_name: "x".into(),
                    reason: "y".into(),
                },
                3,
            ),
            (
                KlineTraderError::RuleParse(ParseError {
                    message: "expected ')'".into(),
                    position: 3,
                }),
                4,
            ),
            (KlineTraderError::MissingColumns { missing: vec!["close".into()] }, 5),
            (KlineTraderError::NoData { interval: None }, 5),
        ];
        for (err, code) in cases {
            assert_eq!(
                exit_code_text(ExitCode::from(&err)),
                exit_code_text(ExitCode::from(code)),
                "{err}"
            );
        }
    }
}

mod commands {
    use super::*;

    fn run(args: &[&str]) -> ExitCode {
        cli::run(Cli::parse_from(args))
    }

    #[test]
    fn backtest_writes_reports() {
        let dir = TempDir::new().unwrap();
        let config = write_file(dir.path(), "cfg.ini", VALID_INI);
        let data = write_file(dir.path(), "klines.csv", &panel_csv(&crash_klines()));
        let out = dir.path().join("report");

        let code = run(&[
            "klinetrader",
            "backtest",
            "-c",
            config.to_str().unwrap(),
            "-d",
            data.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);
        assert_eq!(exit_code_text(code), exit_code_text(ExitCode::SUCCESS));

        let trades = fs::read_to_string(out.join("trades.csv")).unwrap();
        let lines: Vec<&str> = trades.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("BTC,1h,long,"));
        assert!(lines[1].contains("gap_through_stop"));

        let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
        assert!(summary.contains("total_trades,1"));
        assert!(summary.contains("termination,completed"));
        assert!(out.join("equity.csv").exists());
    }

    #[test]
    fn backtest_symbol_override() {
        let dir = TempDir::new().unwrap();
        let config = write_file(dir.path(), "cfg.ini", VALID_INI);
        let data = write_file(dir.path(), "klines.csv", &panel_csv(&crash_klines()));
        let out = dir.path().join("report");

        run(&[
            "klinetrader",
            "backtest",
            "-c",
            config.to_str().unwrap(),
            "-d",
            data.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--symbols",
            "eth",
        ]);
        let trades = fs::read_to_string(out.join("trades.csv")).unwrap();
        assert_eq!(trades.lines().count(), 1);
    }

    #[test]
    fn backtest_missing_columns_fails_with_data_code() {
        let dir = TempDir::new().unwrap();
        let config = write_file(dir.path(), "cfg.ini", VALID_INI);
        let data = write_file(
            dir.path(),
            "klines.csv",
            "symbol,interval,timestamp,open,high,low\nBTC,1h,0,1,1,1\n",
        );
        let out = dir.path().join("report");

        let code = run(&[
            "klinetrader",
            "backtest",
            "-c",
            config.to_str().unwrap(),
            "-d",
            data.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);
        assert_eq!(exit_code_text(code), exit_code_text(ExitCode::from(5)));
        assert!(!out.exists());
    }

    #[test]
    fn backtest_unknown_interval_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_file(dir.path(), "cfg.ini", VALID_INI);
        let data = write_file(dir.path(), "klines.csv", &panel_csv(&crash_klines()));

        let code = run(&[
            "klinetrader",
            "backtest",
            "-c",
            config.to_str().unwrap(),
            "-d",
            data.to_str().unwrap(),
            "-o",
            dir.path().join("report").to_str().unwrap(),
            "--interval",
            "1d",
        ]);
        assert_eq!(exit_code_text(code), exit_code_text(ExitCode::from(5)));
    }

    #[test]
    fn factors_writes_panel() {
        let dir = TempDir::new().unwrap();
        let data = write_file(dir.path(), "klines.csv", &panel_csv(&rising("BTC", 70)));
        let out = dir.path().join("factors.csv");

        let code = run(&[
            "klinetrader",
            "factors",
            "-d",
            data.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);
        assert_eq!(exit_code_text(code), exit_code_text(ExitCode::SUCCESS));

        let content = fs::read_to_string(&out).unwrap();
        let mut lines = content.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(&header[..4], &["symbol", "interval", "timestamp", "datetime"]);
        assert!(header.contains(&"roc64"));
        assert!(header.contains(&"ma5_pre1"));
        assert_eq!(lines.count(), 70);
    }

    #[test]
    fn validate_accepts_good_config() {
        let dir = TempDir::new().unwrap();
        let config = write_file(dir.path(), "cfg.ini", VALID_INI);
        let code = run(&["klinetrader", "validate", "-c", config.to_str().unwrap()]);
        assert_eq!(exit_code_text(code), exit_code_text(ExitCode::SUCCESS));
    }

    #[test]
    fn validate_rejects_bad_rule() {
        let dir = TempDir::new().unwrap();
        let config = write_file(
            dir.path(),
            "cfg.ini",
            "[strategy]\nentry_rule = AND(ABOVE(close, ma5)\n",
        );
        let code = run(&["klinetrader", "validate", "-c", config.to_str().unwrap()]);
        assert_eq!(exit_code_text(code), exit_code_text(ExitCode::from(4)));
    }

    #[test]
    fn validate_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.ini");
        let code = run(&["klinetrader", "validate", "-c", missing.to_str().unwrap()]);
        assert_eq!(exit_code_text(code), exit_code_text(ExitCode::from(2)));
    }
}
