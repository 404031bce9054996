//! Per-(symbol, interval) series storage, cross-sectional slices and the
//! unified time-window sequence.

use crate::domain::factor::{Factor, FactorRef};
use crate::domain::indicator::{Series, finite};
use crate::domain::kline::Kline;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Identity of one independent series in the panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub interval: String,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
        }
    }

    pub fn of(kline: &Kline) -> Self {
        Self::new(kline.symbol.clone(), kline.interval.clone())
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

/// Split a flat panel into (symbol, interval) series ordered by key, each
/// sorted by timestamp ascending. A repeated timestamp keeps the record seen
/// last.
pub fn partition(klines: Vec<Kline>) -> Vec<(SeriesKey, Vec<Kline>)> {
    let mut groups: BTreeMap<SeriesKey, BTreeMap<i64, Kline>> = BTreeMap::new();
    for kline in klines {
        groups
            .entry(SeriesKey::of(&kline))
            .or_default()
            .insert(kline.timestamp, kline);
    }
    groups
        .into_iter()
        .map(|(key, bars)| (key, bars.into_values().collect()))
        .collect()
}

/// One (symbol, interval) series with its factor columns.
#[derive(Debug, Clone)]
pub struct FactorSeries {
    pub key: SeriesKey,
    pub klines: Vec<Kline>,
    pub columns: HashMap<Factor, Series>,
    pub timestamp_index: HashMap<i64, usize>,
}

impl FactorSeries {
    pub fn new(key: SeriesKey, klines: Vec<Kline>, columns: HashMap<Factor, Series>) -> Self {
        let timestamp_index = klines
            .iter()
            .enumerate()
            .map(|(i, k)| (k.timestamp, i))
            .collect();
        Self {
            key,
            klines,
            columns,
            timestamp_index,
        }
    }

    pub fn len(&self) -> usize {
        self.klines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.klines.is_empty()
    }

    pub fn index_of(&self, timestamp: i64) -> Option<usize> {
        self.timestamp_index.get(&timestamp).copied()
    }

    /// Value of `column` at bar `index`, looking back `column.lag` bars within
    /// this series.
    pub fn value(&self, column: FactorRef, index: usize) -> Option<f64> {
        let i = index.checked_sub(column.lag)?;
        let kline = self.klines.get(i)?;
        match column.factor.read_kline(kline) {
            Some(value) => value.and_then(finite),
            None => self.columns.get(&column.factor).and_then(|s| s.get(i).copied().flatten()),
        }
    }

    pub fn row(&self, index: usize) -> FactorRow<'_> {
        FactorRow {
            series: self,
            index,
        }
    }

    pub fn row_at(&self, timestamp: i64) -> Option<FactorRow<'_>> {
        self.index_of(timestamp).map(|i| self.row(i))
    }
}

/// A borrowed view of one row of one series.
#[derive(Debug, Clone, Copy)]
pub struct FactorRow<'a> {
    pub series: &'a FactorSeries,
    pub index: usize,
}

impl<'a> FactorRow<'a> {
    pub fn kline(&self) -> &'a Kline {
        &self.series.klines[self.index]
    }

    pub fn key(&self) -> &'a SeriesKey {
        &self.series.key
    }

    pub fn symbol(&self) -> &'a str {
        &self.series.key.symbol
    }

    pub fn interval(&self) -> &'a str {
        &self.series.key.interval
    }

    pub fn timestamp(&self) -> i64 {
        self.kline().timestamp
    }

    pub fn value(&self, column: FactorRef) -> Option<f64> {
        self.series.value(column, self.index)
    }

    pub fn get(&self, factor: Factor) -> Option<f64> {
        self.value(FactorRef::current(factor))
    }
}

/// The factor panel: every series, in (symbol, interval) order.
#[derive(Debug, Clone, Default)]
pub struct FactorPanel {
    pub series: Vec<FactorSeries>,
}

impl FactorPanel {
    pub fn new(series: Vec<FactorSeries>) -> Self {
        Self { series }
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn row_count(&self) -> usize {
        self.series.iter().map(FactorSeries::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn find(&self, key: &SeriesKey) -> Option<&FactorSeries> {
        self.series.iter().find(|s| &s.key == key)
    }

    /// Keep only series of one interval.
    pub fn retain_interval(mut self, interval: &str) -> Self {
        self.series.retain(|s| s.key.interval == interval);
        self
    }

    /// Keep only the listed symbols. An empty list keeps everything.
    pub fn retain_symbols(mut self, symbols: &[String]) -> Self {
        if !symbols.is_empty() {
            self.series.retain(|s| symbols.contains(&s.key.symbol));
        }
        self
    }

    /// All rows sharing `timestamp`, in (symbol, interval) order.
    pub fn slice(&self, timestamp: i64) -> Vec<FactorRow<'_>> {
        slice_at(&self.series, timestamp)
    }

    pub fn time_windows(&self) -> Vec<i64> {
        build_time_windows(&self.series)
    }
}

/// Ascending distinct timestamps present in any of `series`.
pub fn build_time_windows<'a, I>(series: I) -> Vec<i64>
where
    I: IntoIterator<Item = &'a FactorSeries>,
{
    let unique: BTreeSet<i64> = series
        .into_iter()
        .flat_map(|s| s.klines.iter().map(|k| k.timestamp))
        .collect();
    unique.into_iter().collect()
}

/// Rows of `series` at `timestamp`; series without a bar there are skipped.
pub fn slice_at<'a, I>(series: I, timestamp: i64) -> Vec<FactorRow<'a>>
where
    I: IntoIterator<Item = &'a FactorSeries>,
{
    series
        .into_iter()
        .filter_map(|s| s.row_at(timestamp))
        .collect()
}
