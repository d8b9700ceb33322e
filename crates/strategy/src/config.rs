use serde::{Deserialize, Serialize};

use common::Timeframe;

/// `[strategy]` section of the ruleset file.
///
/// ```toml
/// [strategy]
/// trigger_timeframe = "H1"
/// context_timeframe = "H4"
/// pattern_window = 5
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Timeframe the entry is timed on (RSI and ATR checks).
    pub trigger_timeframe: Timeframe,
    /// Higher timeframe that sets the trend (EMA200 checks).
    pub context_timeframe: Timeframe,
    /// Trailing raw candles per timeframe shown to the oracle.
    pub pattern_window: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            trigger_timeframe: Timeframe::H1,
            context_timeframe: Timeframe::H4,
            pattern_window: 5,
        }
    }
}
