//! Kline ingestion port.

use crate::domain::error::KlineTraderError;
use crate::domain::kline::RawKline;

/// A source of raw kline records for any number of (symbol, interval) series.
///
/// Implementations must reject a panel missing any required column with
/// [`KlineTraderError::MissingColumns`] before returning records.
pub trait KlineSource {
    fn fetch_klines(&self) -> Result<Vec<RawKline>, KlineTraderError>;

    /// Human-readable origin, used in log and error messages.
    fn describe(&self) -> String;
}
