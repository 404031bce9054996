//! Trading universe: which symbols and which interval a backtest walks.
//!
//! Parses symbol lists from configuration and drops series that are absent
//! or too short to ever produce indicator values.

use crate::domain::error::KlineTraderError;
use crate::domain::panel::FactorPanel;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universe {
    /// Empty means every symbol in the panel.
    pub symbols: Vec<String>,
    pub interval: Option<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize, required: usize },
}

#[derive(Debug)]
pub struct UniverseSelection {
    pub panel: FactorPanel,
    pub skipped: Vec<SkippedSymbol>,
}

/// Restrict `panel` to the universe. Series with fewer than `min_bars` bars
/// are dropped with a warning; an empty result is an error.
pub fn select_universe(
    panel: FactorPanel,
    universe: &Universe,
    min_bars: usize,
) -> Result<UniverseSelection, KlineTraderError> {
    let mut panel = panel;
    if let Some(interval) = &universe.interval {
        panel = panel.retain_interval(interval);
    }
    panel = panel.retain_symbols(&universe.symbols);

    let mut skipped: Vec<SkippedSymbol> = universe
        .symbols
        .iter()
        .filter(|sym| !panel.series.iter().any(|s| &s.key.symbol == *sym))
        .map(|sym| {
            warn!("Skipping {} (no data found)", sym);
            SkippedSymbol {
                symbol: sym.clone(),
                reason: SkipReason::NoData,
            }
        })
        .collect();

    let total = panel.series_count();
    panel.series.retain(|s| {
        if s.len() >= min_bars {
            return true;
        }
        warn!(
            "Skipping {} (only {} bars, minimum {} required)",
            s.key,
            s.len(),
            min_bars
        );
        skipped.push(SkippedSymbol {
            symbol: s.key.symbol.clone(),
            reason: SkipReason::InsufficientBars {
                bars: s.len(),
                required: min_bars,
            },
        });
        false
    });

    if panel.is_empty() {
        return Err(KlineTraderError::NoData {
            interval: universe.interval.clone(),
        });
    }

    if panel.series_count() < total {
        info!(
            "Backtesting {} of {} series",
            panel.series_count(),
            total
        );
    }

    Ok(UniverseSelection { panel, skipped })
}
