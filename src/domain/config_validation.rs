//! Configuration validation.
//!
//! Validates the `[backtest]`, `[factors]` and `[strategy]` sections before
//! anything is built from them. Every key is optional; only values that are
//! present and out of range are rejected.

use crate::domain::error::KlineTraderError;
use crate::domain::factor::FactorRef;
use crate::domain::position::Side;
use crate::domain::rule_parser;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    validate_initial_balance(config)?;
    validate_balance_floor(config)?;
    validate_fee_rate(config)?;
    validate_margin_fraction(config)?;
    validate_max_notional(config)?;
    validate_warmup(config)?;
    validate_symbols(config)?;
    Ok(())
}

pub fn validate_factor_config(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    for key in [
        "min_lookback",
        "atr_period",
        "adx_period",
        "bollinger_period",
        "donchian_period",
    ] {
        if config.get_string("factors", key).is_some() && config.get_int("factors", key, 0) < 1 {
            return Err(invalid("factors", key, format!("{key} must be a positive integer")));
        }
    }
    if config.get_string("factors", "bollinger_mult").is_some()
        && config.get_double("factors", "bollinger_mult", 0.0) <= 0.0
    {
        return Err(invalid("factors", "bollinger_mult", "bollinger_mult must be positive"));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    validate_side(config)?;
    validate_rank_by(config)?;
    validate_top_n(config)?;
    validate_exit_params(config)?;
    validate_entry_rule(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> KlineTraderError {
    KlineTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    let value = config.get_double("backtest", "initial_balance", 1000.0);
    if value <= 0.0 {
        return Err(invalid("backtest", "initial_balance", "initial_balance must be positive"));
    }
    Ok(())
}

fn validate_balance_floor(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    let initial = config.get_double("backtest", "initial_balance", 1000.0);
    let floor = config.get_double("backtest", "balance_floor", 100.0);
    if floor < 0.0 {
        return Err(invalid("backtest", "balance_floor", "balance_floor must be non-negative"));
    }
    if floor >= initial {
        return Err(invalid(
            "backtest",
            "balance_floor",
            "balance_floor must be below initial_balance",
        ));
    }
    Ok(())
}

fn validate_fee_rate(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    let value = config.get_double("backtest", "fee_rate", 0.001);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid("backtest", "fee_rate", "fee_rate must be between 0 and 1"));
    }
    Ok(())
}

fn validate_margin_fraction(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    let value = config.get_double("backtest", "margin_fraction", 0.9);
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            "backtest",
            "margin_fraction",
            "margin_fraction must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_max_notional(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    if config.get_string("backtest", "max_notional").is_none() {
        return Ok(());
    }
    let value = config.get_double("backtest", "max_notional", f64::NAN);
    if value.is_nan() || value <= 0.0 {
        return Err(invalid("backtest", "max_notional", "max_notional must be positive"));
    }
    Ok(())
}

fn validate_warmup(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    for key in ["warmup_windows", "min_bars"] {
        if config.get_int("backtest", key, 0) < 0 {
            return Err(invalid("backtest", key, format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    match config.get_string("backtest", "symbols") {
        Some(s) if !s.trim().is_empty() => parse_symbols(&s)
            .map(|_| ())
            .map_err(|e| invalid("backtest", "symbols", e.to_string())),
        _ => Ok(()),
    }
}

fn validate_side(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    match config.get_string("strategy", "side") {
        Some(s) => s
            .parse::<Side>()
            .map(|_| ())
            .map_err(|e| invalid("strategy", "side", e)),
        None => Ok(()),
    }
}

fn validate_rank_by(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    match config.get_string("strategy", "rank_by") {
        Some(s) => s
            .trim()
            .parse::<FactorRef>()
            .map(|_| ())
            .map_err(|e| invalid("strategy", "rank_by", e.to_string())),
        None => Ok(()),
    }
}

fn validate_top_n(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    if config.get_int("strategy", "top_n", 30) < 1 {
        return Err(invalid("strategy", "top_n", "top_n must be at least 1"));
    }
    Ok(())
}

fn validate_exit_params(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    let multiplier = config.get_double("strategy", "atr_multiplier", 0.7);
    if multiplier <= 0.0 {
        return Err(invalid(
            "strategy",
            "atr_multiplier",
            "atr_multiplier must be positive",
        ));
    }
    let cap = config.get_double("strategy", "atr_cap_pct", 3.0);
    if cap < 0.0 {
        return Err(invalid(
            "strategy",
            "atr_cap_pct",
            "atr_cap_pct must be non-negative (0 disables the cap)",
        ));
    }
    Ok(())
}

fn validate_entry_rule(config: &dyn ConfigPort) -> Result<(), KlineTraderError> {
    match config.get_string("strategy", "entry_rule") {
        Some(s) if !s.trim().is_empty() => {
            rule_parser::parse(&s)?;
            Ok(())
        }
        Some(_) => Err(KlineTraderError::ConfigMissing {
            section: "strategy".to_string(),
            key: "entry_rule".to_string(),
        }),
        None => Ok(()),
    }
}
