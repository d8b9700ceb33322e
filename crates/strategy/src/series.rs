use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use common::{Candle, Error, RawCandle, Result, Timeframe};

/// Timestamp layouts accepted in string form, besides RFC 3339.
/// The first two are what MetaTrader's `TimeToString` produces.
const TIME_FORMATS: &[&str] = &[
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Epoch values at or above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// A validated, ascending candle series for one timeframe of one instrument.
///
/// Construction goes through [`CandleSeries::validate`], so every instance
/// holds strictly increasing timestamps, finite positive prices with
/// `high >= low`, and at least the lookback it was validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Normalize and validate raw candles.
    ///
    /// Candles may arrive in either order; they are sorted ascending by
    /// timestamp. Fails with `Error::DataFormat` on a missing or non-numeric
    /// field, a non-positive price, `high < low`, a negative volume or a
    /// duplicated timestamp, and with `Error::InsufficientData` when fewer than
    /// `min_len` candles remain.
    pub fn validate(timeframe: Timeframe, raw: &[RawCandle], min_len: usize) -> Result<Self> {
        let mut candles = raw
            .iter()
            .enumerate()
            .map(|(idx, rc)| parse_candle(timeframe, idx, rc))
            .collect::<Result<Vec<_>>>()?;

        candles.sort_by_key(|c| c.timestamp);

        if let Some(pair) = candles
            .windows(2)
            .find(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(Error::DataFormat(format!(
                "{timeframe}: duplicate candle timestamp {}",
                pair[1].timestamp.to_rfc3339()
            )));
        }

        if candles.len() < min_len {
            return Err(Error::InsufficientData {
                timeframe,
                required: min_len,
                actual: candles.len(),
            });
        }

        Ok(Self { timeframe, candles })
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// The last closed candle.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// The trailing `n` candles (fewer if the series is shorter).
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }
}

fn parse_candle(timeframe: Timeframe, idx: usize, raw: &RawCandle) -> Result<Candle> {
    let field_err = |field: &str, value: &Value| {
        let what = if value.is_null() { "missing" } else { "non-numeric" };
        Error::DataFormat(format!("{timeframe}[{idx}]: {what} field '{field}'"))
    };

    let timestamp = parse_timestamp(&raw.time).ok_or_else(|| field_err("time", &raw.time))?;

    let price = |field: &str, value: &Value| -> Result<f64> {
        let v = coerce_f64(value).ok_or_else(|| field_err(field, value))?;
        if !v.is_finite() || v <= 0.0 {
            return Err(Error::DataFormat(format!(
                "{timeframe}[{idx}]: field '{field}' must be a positive number, got {v}"
            )));
        }
        Ok(v)
    };

    let open = price("open", &raw.open)?;
    let high = price("high", &raw.high)?;
    let low = price("low", &raw.low)?;
    let close = price("close", &raw.close)?;

    if high < low {
        return Err(Error::DataFormat(format!(
            "{timeframe}[{idx}]: high {high} is below low {low}"
        )));
    }

    let volume = if raw.volume.is_null() {
        None
    } else {
        let v = coerce_f64(&raw.volume).ok_or_else(|| field_err("volume", &raw.volume))?;
        if !v.is_finite() || v < 0.0 {
            return Err(Error::DataFormat(format!(
                "{timeframe}[{idx}]: volume must be non-negative, got {v}"
            )));
        }
        Some(v)
    };

    Ok(Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
    })
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(epoch) = s.parse::<i64>() {
                return from_epoch(epoch);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

fn from_epoch(epoch: i64) -> Option<DateTime<Utc>> {
    if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}
