pub mod atr;
pub mod ema;
pub mod rsi;

pub use atr::AtrIndicator;
pub use ema::EmaIndicator;
pub use rsi::RsiIndicator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{Error, Result, Timeframe, Trend};

use crate::series::CandleSeries;

pub const EMA_FAST: usize = 20;
pub const EMA_MID: usize = 50;
pub const EMA_SLOW: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;

/// Shortest series for which every snapshot value is defined.
pub const REQUIRED_LOOKBACK: usize = max(EMA_SLOW, max(RSI_PERIOD + 1, ATR_PERIOD + 1));

const fn max(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Indicator values at the last closed candle of one series.
/// Recomputed on every request; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub rsi14: f64,
    pub atr14: f64,
    pub trend: Trend,
}

impl IndicatorSnapshot {
    /// UP only when the close is strictly above the slow EMA.
    pub fn trend_of(close: f64, ema200: f64) -> Trend {
        if close > ema200 {
            Trend::Up
        } else {
            Trend::Down
        }
    }
}

/// Full indicator history aligned index-for-index with the candle series.
/// `None` marks positions before an indicator's seed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorSeries {
    pub ema20: Vec<Option<f64>>,
    pub ema50: Vec<Option<f64>>,
    pub ema200: Vec<Option<f64>>,
    pub rsi14: Vec<Option<f64>>,
    pub atr14: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub snapshot: IndicatorSnapshot,
    pub series: IndicatorSeries,
}

/// Compute EMA(20/50/200), RSI(14) and ATR(14) over a validated series.
///
/// Fails with `Error::InsufficientData` only if the series is shorter than
/// [`REQUIRED_LOOKBACK`], which validation normally rules out.
pub fn analyze(series: &CandleSeries) -> Result<Analysis> {
    let closes = series.closes();
    let indicators = IndicatorSeries {
        ema20: EmaIndicator::new(EMA_FAST).series(&closes),
        ema50: EmaIndicator::new(EMA_MID).series(&closes),
        ema200: EmaIndicator::new(EMA_SLOW).series(&closes),
        rsi14: RsiIndicator::new(RSI_PERIOD).series(&closes),
        atr14: AtrIndicator::new(ATR_PERIOD).series(series.candles()),
    };

    let insufficient = || Error::InsufficientData {
        timeframe: series.timeframe(),
        required: REQUIRED_LOOKBACK,
        actual: series.len(),
    };
    let candle = series.last().ok_or_else(insufficient)?;
    let ema200 = last(&indicators.ema200).ok_or_else(insufficient)?;

    let snapshot = IndicatorSnapshot {
        timeframe: series.timeframe(),
        timestamp: candle.timestamp,
        close: candle.close,
        ema20: last(&indicators.ema20).ok_or_else(insufficient)?,
        ema50: last(&indicators.ema50).ok_or_else(insufficient)?,
        ema200,
        rsi14: last(&indicators.rsi14).ok_or_else(insufficient)?,
        atr14: last(&indicators.atr14).ok_or_else(insufficient)?,
        trend: IndicatorSnapshot::trend_of(candle.close, ema200),
    };

    Ok(Analysis {
        snapshot,
        series: indicators,
    })
}

fn last(values: &[Option<f64>]) -> Option<f64> {
    values.last().copied().flatten()
}
