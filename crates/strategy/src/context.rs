use serde::{Deserialize, Serialize};

use common::{Candle, Timeframe};

use crate::indicators::{Analysis, IndicatorSnapshot};
use crate::series::CandleSeries;

/// A recent candle plus the RSI at that bar, for pattern and divergence reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentCandle {
    pub candle: Candle,
    pub rsi14: Option<f64>,
}

/// What the context holds for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeView {
    pub snapshot: IndicatorSnapshot,
    /// Oldest first.
    pub recent: Vec<RecentCandle>,
}

impl TimeframeView {
    /// Snapshot plus the trailing `window` candles of `series`.
    pub fn new(series: &CandleSeries, analysis: &Analysis, window: usize) -> Self {
        let start = series.len().saturating_sub(window);
        let recent = series
            .tail(window)
            .iter()
            .enumerate()
            .map(|(offset, candle)| RecentCandle {
                candle: *candle,
                rsi14: analysis
                    .series
                    .rsi14
                    .get(start + offset)
                    .copied()
                    .flatten(),
            })
            .collect();

        Self {
            snapshot: analysis.snapshot.clone(),
            recent,
        }
    }
}

/// Per-request market picture: the trigger timeframe (entry timing) and the
/// context timeframe (trend), each with indicators and a short candle window.
/// Built once per request and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub symbol: String,
    pub trigger: TimeframeView,
    pub context: TimeframeView,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl MarketContext {
    pub fn new(symbol: impl Into<String>, trigger: TimeframeView, context: TimeframeView) -> Self {
        Self {
            symbol: symbol.into(),
            trigger,
            context,
            bid: None,
            ask: None,
        }
    }

    pub fn with_quote(mut self, bid: Option<f64>, ask: Option<f64>) -> Self {
        self.bid = bid;
        self.ask = ask;
        self
    }

    /// Snapshot for a given timeframe label.
    pub fn snapshot(&self, timeframe: Timeframe) -> Option<&IndicatorSnapshot> {
        self.views()
            .find(|v| v.snapshot.timeframe == timeframe)
            .map(|v| &v.snapshot)
    }

    /// Views ordered from higher (context) to lower (trigger) timeframe.
    pub fn views(&self) -> impl Iterator<Item = &TimeframeView> {
        [&self.context, &self.trigger].into_iter()
    }
}
