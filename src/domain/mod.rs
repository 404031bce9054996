//! Core domain types and logic.

pub mod account;
pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod factor;
pub mod indicator;
pub mod kline;
pub mod metrics;
pub mod panel;
pub mod position;
pub mod rule;
pub mod rule_eval;
pub mod rule_parser;
pub mod signal;
pub mod strategy;
pub mod universe;
