//! Factor engine: turns a kline panel into a [`FactorPanel`].
//!
//! Every rolling indicator is computed inclusive of its bar and then moved
//! one bar forward, so the value at row `t` is built from bars `t-N..=t-1`.
//! The only columns that read bar `t` itself are the raw kline fields, the
//! kline-derived fields, `true_range`, `volume_ratio{N}` (current volume over
//! the prior-bar volume MA) and `atr_change` (current true range over the
//! prior-bar ATR).

use crate::domain::indicator::adx::adx;
use crate::domain::indicator::atr::{atr, true_range};
use crate::domain::indicator::bollinger::bollinger;
use crate::domain::indicator::donchian::donchian;
use crate::domain::indicator::moving_average::sma;
use crate::domain::indicator::roc::roc;
use crate::domain::indicator::{Series, finite, prior_bar};
use crate::domain::kline::Kline;
use crate::domain::panel::{FactorPanel, FactorSeries, SeriesKey, partition};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Moving-average windows (close and volume).
pub const MA_WINDOWS: [usize; 8] = [3, 5, 10, 15, 20, 30, 60, 96];

/// Rate-of-change windows.
pub const ROC_WINDOWS: [usize; 6] = [1, 4, 16, 32, 64, 96];

/// Deepest lag written to the exported factor panel.
pub const MAX_EXPORT_LAG: usize = 3;

const LAG_SUFFIX: &str = "_pre";

/// A named factor column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Factor {
    Open,
    High,
    Low,
    Close,
    Volume,
    Amount,
    TakerBuyAmount,
    TakerSellAmount,
    DeltaRatio,
    BuySellRatio,
    CandleReturn,
    UpperShadow,
    UpperShadowRatio,
    TrueRange,
    Ma(usize),
    VolumeMa(usize),
    VolumeRatio(usize),
    Roc(usize),
    DonchianUpper,
    DonchianLower,
    BollUpper,
    BollMid,
    BollLower,
    Atr,
    AtrPct,
    AtrChange,
    Adx,
    PlusDi,
    MinusDi,
}

impl Factor {
    /// True for columns allowed to read the bar they sit on.
    pub fn is_current_bar(self) -> bool {
        matches!(
            self,
            Factor::Open
                | Factor::High
                | Factor::Low
                | Factor::Close
                | Factor::Volume
                | Factor::Amount
                | Factor::TakerBuyAmount
                | Factor::TakerSellAmount
                | Factor::DeltaRatio
                | Factor::BuySellRatio
                | Factor::CandleReturn
                | Factor::UpperShadow
                | Factor::UpperShadowRatio
                | Factor::TrueRange
                | Factor::VolumeRatio(_)
                | Factor::AtrChange
        )
    }

    /// Read the factor straight off a kline.
    ///
    /// The outer `Option` is `None` when the factor is not a kline field and
    /// must be looked up in the computed columns instead.
    pub fn read_kline(self, kline: &Kline) -> Option<Option<f64>> {
        let value = match self {
            Factor::Open => kline.open,
            Factor::High => kline.high,
            Factor::Low => kline.low,
            Factor::Close => kline.close,
            Factor::Volume => kline.volume,
            Factor::Amount => kline.amount,
            Factor::TakerBuyAmount => kline.taker_buy_amount,
            Factor::TakerSellAmount => kline.taker_sell_amount(),
            Factor::DeltaRatio => kline.delta_ratio(),
            Factor::CandleReturn => kline.candle_return(),
            Factor::UpperShadow => kline.upper_shadow(),
            Factor::BuySellRatio => return Some(kline.buy_sell_ratio()),
            Factor::UpperShadowRatio => return Some(kline.upper_shadow_ratio()),
            _ => return None,
        };
        Some(Some(value))
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factor::Open => write!(f, "open"),
            Factor::High => write!(f, "high"),
            Factor::Low => write!(f, "low"),
            Factor::Close => write!(f, "close"),
            Factor::Volume => write!(f, "volume"),
            Factor::Amount => write!(f, "amount"),
            Factor::TakerBuyAmount => write!(f, "taker_buy_amount"),
            Factor::TakerSellAmount => write!(f, "taker_sell_amount"),
            Factor::DeltaRatio => write!(f, "delta_ratio"),
            Factor::BuySellRatio => write!(f, "buy_sell_ratio"),
            Factor::CandleReturn => write!(f, "candle_return"),
            Factor::UpperShadow => write!(f, "upper_shadow"),
            Factor::UpperShadowRatio => write!(f, "upper_shadow_ratio"),
            Factor::TrueRange => write!(f, "true_range"),
            Factor::Ma(n) => write!(f, "ma{n}"),
            Factor::VolumeMa(n) => write!(f, "volume_ma{n}"),
            Factor::VolumeRatio(n) => write!(f, "volume_ratio{n}"),
            Factor::Roc(n) => write!(f, "roc{n}"),
            Factor::DonchianUpper => write!(f, "donchian_upper"),
            Factor::DonchianLower => write!(f, "donchian_lower"),
            Factor::BollUpper => write!(f, "boll_upper"),
            Factor::BollMid => write!(f, "boll_mid"),
            Factor::BollLower => write!(f, "boll_lower"),
            Factor::Atr => write!(f, "atr"),
            Factor::AtrPct => write!(f, "atr_pct"),
            Factor::AtrChange => write!(f, "atr_change"),
            Factor::Adx => write!(f, "adx"),
            Factor::PlusDi => write!(f, "plus_di"),
            Factor::MinusDi => write!(f, "minus_di"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown factor column '{0}'")]
pub struct UnknownColumn(pub String);

fn windowed(name: &str, prefix: &str, windows: &[usize]) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = digits.parse().ok()?;
    windows.contains(&n).then_some(n)
}

impl FromStr for Factor {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let factor = match s {
            "open" => Factor::Open,
            "high" => Factor::High,
            "low" => Factor::Low,
            "close" => Factor::Close,
            "volume" => Factor::Volume,
            "amount" => Factor::Amount,
            "taker_buy_amount" => Factor::TakerBuyAmount,
            "taker_sell_amount" => Factor::TakerSellAmount,
            "delta_ratio" => Factor::DeltaRatio,
            "buy_sell_ratio" => Factor::BuySellRatio,
            "candle_return" => Factor::CandleReturn,
            "upper_shadow" => Factor::UpperShadow,
            "upper_shadow_ratio" => Factor::UpperShadowRatio,
            "true_range" => Factor::TrueRange,
            "donchian_upper" => Factor::DonchianUpper,
            "donchian_lower" => Factor::DonchianLower,
            "boll_upper" => Factor::BollUpper,
            "boll_mid" => Factor::BollMid,
            "boll_lower" => Factor::BollLower,
            "atr" => Factor::Atr,
            "atr_pct" => Factor::AtrPct,
            "atr_change" => Factor::AtrChange,
            "adx" => Factor::Adx,
            "plus_di" => Factor::PlusDi,
            "minus_di" => Factor::MinusDi,
            other => {
                if let Some(n) = windowed(other, "volume_ratio", &MA_WINDOWS) {
                    Factor::VolumeRatio(n)
                } else if let Some(n) = windowed(other, "volume_ma", &MA_WINDOWS) {
                    Factor::VolumeMa(n)
                } else if let Some(n) = windowed(other, "ma", &MA_WINDOWS) {
                    Factor::Ma(n)
                } else if let Some(n) = windowed(other, "roc", &ROC_WINDOWS) {
                    Factor::Roc(n)
                } else {
                    return Err(UnknownColumn(other.to_string()));
                }
            }
        };
        Ok(factor)
    }
}

/// A factor read `lag` bars back within its own series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactorRef {
    pub factor: Factor,
    pub lag: usize,
}

impl FactorRef {
    pub fn current(factor: Factor) -> Self {
        Self { factor, lag: 0 }
    }

    pub fn lagged(factor: Factor, lag: usize) -> Self {
        Self { factor, lag }
    }
}

impl From<Factor> for FactorRef {
    fn from(factor: Factor) -> Self {
        Self::current(factor)
    }
}

impl fmt::Display for FactorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lag == 0 {
            write!(f, "{}", self.factor)
        } else {
            write!(f, "{}{LAG_SUFFIX}{}", self.factor, self.lag)
        }
    }
}

impl FromStr for FactorRef {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(pos) = s.rfind(LAG_SUFFIX) {
            let digits = &s[pos + LAG_SUFFIX.len()..];
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                let lag = digits
                    .parse()
                    .map_err(|_| UnknownColumn(s.to_string()))?;
                let factor = s[..pos]
                    .parse()
                    .map_err(|_| UnknownColumn(s.to_string()))?;
                return Ok(Self::lagged(factor, lag));
            }
        }
        s.parse().map(Self::current)
    }
}

/// Parameters of the factor engine (`[factors]` config section).
#[derive(Debug, Clone, PartialEq)]
pub struct FactorConfig {
    /// Series shorter than this get all-null indicator columns.
    pub min_lookback: usize,
    pub atr_period: usize,
    pub adx_period: usize,
    pub bollinger_period: usize,
    pub bollinger_mult: f64,
    pub donchian_period: usize,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            min_lookback: 65,
            atr_period: 14,
            adx_period: 14,
            bollinger_period: 20,
            bollinger_mult: 2.0,
            donchian_period: 20,
        }
    }
}

/// Compute every factor for every (symbol, interval) series in `klines`.
///
/// Series are processed in parallel; the output keeps (symbol, interval)
/// order.
pub fn compute_factors(klines: Vec<Kline>, config: &FactorConfig) -> FactorPanel {
    let series = partition(klines)
        .into_par_iter()
        .map(|(key, bars)| compute_series(key, bars, config))
        .collect();
    FactorPanel::new(series)
}

/// Compute the factor columns of one series. `klines` must already be sorted
/// by timestamp and belong to `key`.
pub fn compute_series(key: SeriesKey, klines: Vec<Kline>, config: &FactorConfig) -> FactorSeries {
    let mut columns: HashMap<Factor, Series> = HashMap::new();
    let tr = true_range(&klines);

    if klines.len() >= config.min_lookback {
        let closes: Vec<f64> = klines.iter().map(|k| k.close).collect();
        let highs: Vec<f64> = klines.iter().map(|k| k.high).collect();
        let lows: Vec<f64> = klines.iter().map(|k| k.low).collect();
        let volumes: Vec<f64> = klines.iter().map(|k| k.volume).collect();

        for n in MA_WINDOWS {
            let volume_ma = align(Factor::VolumeMa(n), sma(&volumes, n));
            columns.insert(Factor::VolumeRatio(n), ratio(&volumes, &volume_ma));
            columns.insert(Factor::VolumeMa(n), volume_ma);
            columns.insert(Factor::Ma(n), align(Factor::Ma(n), sma(&closes, n)));
        }
        for n in ROC_WINDOWS {
            columns.insert(Factor::Roc(n), align(Factor::Roc(n), roc(&closes, n)));
        }

        let (upper, lower) = donchian(&highs, &lows, config.donchian_period);
        columns.insert(Factor::DonchianUpper, align(Factor::DonchianUpper, upper));
        columns.insert(Factor::DonchianLower, align(Factor::DonchianLower, lower));

        let bands = bollinger(&closes, config.bollinger_period, config.bollinger_mult);
        columns.insert(Factor::BollUpper, align(Factor::BollUpper, bands.upper));
        columns.insert(Factor::BollMid, align(Factor::BollMid, bands.middle));
        columns.insert(Factor::BollLower, align(Factor::BollLower, bands.lower));

        let atr_inclusive = atr(&klines, config.atr_period);
        let atr_pct: Series = atr_inclusive
            .iter()
            .zip(&closes)
            .map(|(a, &c)| a.and_then(|a| if c > 0.0 { finite(a / c * 100.0) } else { None }))
            .collect();
        let prior_atr = align(Factor::Atr, atr_inclusive);
        let atr_change: Series = tr
            .iter()
            .zip(&prior_atr)
            .map(|(t, a)| match (t, a) {
                (Some(t), Some(a)) if *a > 0.0 => finite(t / a),
                _ => None,
            })
            .collect();
        columns.insert(Factor::Atr, prior_atr);
        columns.insert(Factor::AtrPct, align(Factor::AtrPct, atr_pct));
        columns.insert(Factor::AtrChange, align(Factor::AtrChange, atr_change));

        let directional = adx(&klines, config.adx_period);
        columns.insert(Factor::Adx, align(Factor::Adx, directional.adx));
        columns.insert(Factor::PlusDi, align(Factor::PlusDi, directional.plus_di));
        columns.insert(Factor::MinusDi, align(Factor::MinusDi, directional.minus_di));
    }

    columns.insert(Factor::TrueRange, align(Factor::TrueRange, tr));
    FactorSeries::new(key, klines, columns)
}

/// Place an indicator computed inclusive of each bar onto the row it may be
/// read from: unchanged for current-bar columns, one bar later otherwise.
fn align(factor: Factor, inclusive: Series) -> Series {
    if factor.is_current_bar() {
        inclusive
    } else {
        prior_bar(&inclusive)
    }
}

/// `values[i] / base[i]`, null when the base is missing or zero.
fn ratio(values: &[f64], base: &[Option<f64>]) -> Series {
    values
        .iter()
        .zip(base)
        .map(|(&v, b)| match b {
            Some(b) if *b != 0.0 => finite(v / b),
            _ => None,
        })
        .collect()
}

/// Columns written to the exported factor panel, in output order.
pub fn export_columns() -> Vec<FactorRef> {
    let mut cols: Vec<FactorRef> = [
        Factor::Open,
        Factor::High,
        Factor::Low,
        Factor::Close,
        Factor::Volume,
        Factor::Amount,
        Factor::TakerBuyAmount,
        Factor::TakerSellAmount,
        Factor::DeltaRatio,
        Factor::BuySellRatio,
        Factor::CandleReturn,
        Factor::UpperShadow,
        Factor::UpperShadowRatio,
        Factor::TrueRange,
    ]
    .into_iter()
    .map(FactorRef::current)
    .collect();

    let with_lags = |cols: &mut Vec<FactorRef>, factor: Factor| {
        cols.extend((0..=MAX_EXPORT_LAG).map(|lag| FactorRef::lagged(factor, lag)));
    };

    for factor in [Factor::Open, Factor::High, Factor::Low, Factor::Close, Factor::Volume] {
        cols.extend((1..=MAX_EXPORT_LAG).map(|lag| FactorRef::lagged(factor, lag)));
    }
    for n in MA_WINDOWS {
        with_lags(&mut cols, Factor::Ma(n));
    }
    for n in MA_WINDOWS {
        cols.push(Factor::VolumeMa(n).into());
        cols.push(Factor::VolumeRatio(n).into());
    }
    cols.extend(ROC_WINDOWS.iter().map(|&n| FactorRef::current(Factor::Roc(n))));
    with_lags(&mut cols, Factor::DonchianUpper);
    with_lags(&mut cols, Factor::DonchianLower);
    cols.extend(
        [
            Factor::BollUpper,
            Factor::BollMid,
            Factor::BollLower,
            Factor::Atr,
            Factor::AtrPct,
            Factor::AtrChange,
            Factor::Adx,
            Factor::PlusDi,
            Factor::MinusDi,
        ]
        .into_iter()
        .map(FactorRef::current),
    );
    cols
}
