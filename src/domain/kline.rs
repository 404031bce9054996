//! Kline representation and normalization of raw exchange records.

use crate::domain::error::KlineTraderError;
use serde::Deserialize;

/// Columns a kline panel must carry. Anything else is ignored.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "symbol",
    "interval",
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "amount",
    "taker_buy_amount",
];

/// A kline as delivered by the ingestion side: every numeric field is still text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawKline {
    pub symbol: String,
    pub interval: String,
    pub timestamp: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub amount: String,
    pub taker_buy_amount: String,
    #[serde(default)]
    pub taker_buy_volume: Option<String>,
}

/// One candle for one (symbol, interval). `timestamp` is the open time in ms.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub symbol: String,
    pub interval: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    pub taker_buy_volume: f64,
    pub taker_buy_amount: f64,
}

impl Kline {
    /// amount - taker_buy_amount
    pub fn taker_sell_amount(&self) -> f64 {
        self.amount - self.taker_buy_amount
    }

    /// (taker_buy - taker_sell) / amount, 0 when amount is 0.
    pub fn delta_ratio(&self) -> f64 {
        if self.amount == 0.0 {
            return 0.0;
        }
        (self.taker_buy_amount - self.taker_sell_amount()) / self.amount
    }

    /// (close - open) / open * 100, 0 when open is 0.
    pub fn candle_return(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        (self.close - self.open) / self.open * 100.0
    }

    /// taker_buy_amount / taker_sell_amount, undefined when nothing was sold.
    pub fn buy_sell_ratio(&self) -> Option<f64> {
        let sell = self.taker_sell_amount();
        if sell == 0.0 || !sell.is_finite() {
            return None;
        }
        Some(self.taker_buy_amount / sell)
    }

    /// high - max(open, close)
    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    /// Upper shadow as a fraction of the bar's range.
    pub fn upper_shadow_ratio(&self) -> Option<f64> {
        let range = self.high - self.low;
        if range > 0.0 {
            Some(self.upper_shadow() / range)
        } else {
            None
        }
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// True when every price and volume field parsed to a finite number.
    pub fn is_well_formed(&self) -> bool {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.amount,
            self.taker_buy_amount,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Fail fast when a panel header lacks any of [`REQUIRED_COLUMNS`].
pub fn validate_columns<S: AsRef<str>>(headers: &[S]) -> Result<(), KlineTraderError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h.as_ref().trim() == **col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(KlineTraderError::MissingColumns { missing })
    }
}

/// Numeric coercion: anything that is not a number becomes NaN.
fn coerce(field: &str) -> f64 {
    field.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_timestamp(field: &str) -> Option<i64> {
    let trimmed = field.trim();
    if let Ok(ts) = trimmed.parse::<i64>() {
        return Some(ts);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}

/// Convert one raw record. Returns `None` only when the row cannot be keyed
/// (blank symbol/interval or an unparseable timestamp); bad numeric fields are
/// carried as NaN.
pub fn normalize(raw: &RawKline) -> Option<Kline> {
    let symbol = raw.symbol.trim();
    let interval = raw.interval.trim();
    if symbol.is_empty() || interval.is_empty() {
        return None;
    }
    let timestamp = parse_timestamp(&raw.timestamp)?;

    Some(Kline {
        symbol: symbol.to_string(),
        interval: interval.to_string(),
        timestamp,
        open: coerce(&raw.open),
        high: coerce(&raw.high),
        low: coerce(&raw.low),
        close: coerce(&raw.close),
        volume: coerce(&raw.volume),
        amount: coerce(&raw.amount),
        taker_buy_volume: raw.taker_buy_volume.as_deref().map(coerce).unwrap_or(f64::NAN),
        taker_buy_amount: coerce(&raw.taker_buy_amount),
    })
}

/// Normalize a batch, returning the klines and the number of unkeyable rows dropped.
pub fn normalize_all(raws: &[RawKline]) -> (Vec<Kline>, usize) {
    let mut klines = Vec::with_capacity(raws.len());
    let mut dropped = 0;
    for raw in raws {
        match normalize(raw) {
            Some(k) => klines.push(k),
            None => dropped += 1,
        }
    }
    (klines, dropped)
}
