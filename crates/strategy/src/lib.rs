//! Market analysis: candle validation, indicators, market context, and the
//! prompt/response contract with the decision oracle.

pub mod config;
pub mod context;
pub mod indicators;
pub mod prompt;
pub mod response;
pub mod series;

pub use config::StrategyConfig;
pub use context::{MarketContext, RecentCandle, TimeframeView};
pub use indicators::{analyze, Analysis, IndicatorSeries, IndicatorSnapshot, REQUIRED_LOOKBACK};
pub use prompt::{decision_schema, PromptBuilder};
pub use response::parse_decision;
pub use series::CandleSeries;
