#![allow(dead_code)]

use klinetrader::domain::error::KlineTraderError;
pub use klinetrader::domain::kline::{Kline, RawKline};
use klinetrader::ports::data_port::KlineSource;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const HOUR_MS: i64 = 3_600_000;
pub const START_MS: i64 = 1_700_000_000_000;

pub const PANEL_HEADER: &str =
    "symbol,interval,timestamp,open,high,low,close,volume,amount,taker_buy_amount,taker_buy_volume";

pub struct MockKlineSource {
    pub records: Vec<RawKline>,
    pub error: Option<String>,
}

impl MockKlineSource {
    pub fn new(klines: &[Kline]) -> Self {
        Self {
            records: klines.iter().map(to_raw).collect(),
            error: None,
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl KlineSource for MockKlineSource {
    fn fetch_klines(&self) -> Result<Vec<RawKline>, KlineTraderError> {
        if let Some(reason) = &self.error {
            return Err(KlineTraderError::DataRead {
                source_name: self.describe(),
                reason: reason.clone(),
            });
        }
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

pub fn to_raw(k: &Kline) -> RawKline {
    RawKline {
        symbol: k.symbol.clone(),
        interval: k.interval.clone(),
        timestamp: k.timestamp.to_string(),
        open: k.open.to_string(),
        high: k.high.to_string(),
        low: k.low.to_string(),
        close: k.close.to_string(),
        volume: k.volume.to_string(),
        amount: k.amount.to_string(),
        taker_buy_amount: k.taker_buy_amount.to_string(),
        taker_buy_volume: Some(k.taker_buy_volume.to_string()),
    }
}

/// Hourly bar `i` with the given close; open half a point below, high half a
/// point above, low a point below.
pub fn make_kline(symbol: &str, i: usize, close: f64) -> Kline {
    Kline {
        symbol: symbol.to_string(),
        interval: "1h".to_string(),
        timestamp: START_MS + i as i64 * HOUR_MS,
        open: close - 0.5,
        high: close + 0.5,
        low: close - 1.0,
        close,
        volume: 100.0,
        amount: 100.0 * close,
        taker_buy_volume: 60.0,
        taker_buy_amount: 60.0 * close,
    }
}

/// close = 100 + i
pub fn rising(symbol: &str, n: usize) -> Vec<Kline> {
    (0..n).map(|i| make_kline(symbol, i, 100.0 + i as f64)).collect()
}

/// close = 200 - i
pub fn falling(symbol: &str, n: usize) -> Vec<Kline> {
    (0..n).map(|i| make_kline(symbol, i, 200.0 - i as f64)).collect()
}

pub fn timestamp_of(i: usize) -> i64 {
    START_MS + i as i64 * HOUR_MS
}

pub fn panel_csv(klines: &[Kline]) -> String {
    let mut out = String::from(PANEL_HEADER);
    out.push('\n');
    for k in klines {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{}\n",
            k.symbol,
            k.interval,
            k.timestamp,
            k.open,
            k.high,
            k.low,
            k.close,
            k.volume,
            k.amount,
            k.taker_buy_amount,
            k.taker_buy_volume
        ));
    }
    out
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}
