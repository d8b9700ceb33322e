use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;

/// Candle aggregation period, named the way the trading terminal names them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            "W1" => Ok(Timeframe::W1),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}

/// One validated OHLC bar. Immutable once ingested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// A candle as it arrives on the wire. Fields are loosely typed: the terminal
/// may send numbers, numeric strings, or omit fields entirely. The validator
/// in `crates/strategy` turns these into [`Candle`]s or rejects them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCandle {
    #[serde(default, alias = "timestamp")]
    pub time: Value,
    #[serde(default)]
    pub open: Value,
    #[serde(default)]
    pub high: Value,
    #[serde(default)]
    pub low: Value,
    #[serde(default)]
    pub close: Value,
    #[serde(default, alias = "tick_volume")]
    pub volume: Value,
}

/// Inbound decision request: one symbol, one candle series per timeframe.
///
/// Besides the `candles` map, top-level `candles_<tf>` fields (the shape the
/// terminal's expert advisor posts, e.g. `candles_h1`) are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub symbol: String,
    #[serde(default)]
    pub candles: BTreeMap<Timeframe, Vec<RawCandle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AnalysisRequest {
    /// Raw candles for `timeframe`, looking in `candles` first and then in a
    /// `candles_<tf>` top-level field.
    pub fn raw_candles(&self, timeframe: Timeframe) -> Option<Vec<RawCandle>> {
        if let Some(candles) = self.candles.get(&timeframe) {
            return Some(candles.clone());
        }
        let key = format!("candles_{}", timeframe.as_str().to_lowercase());
        self.extra
            .get(&key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Trading action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Direction of the long-term trend relative to the slow EMA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    Down,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Up => write!(f, "UP"),
            Trend::Down => write!(f, "DOWN"),
        }
    }
}

/// Stop-loss or take-profit level: either an absolute price or a distance in pips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTarget {
    Price(f64),
    Pips(f64),
}

impl std::fmt::Display for PriceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceTarget::Price(p) => write!(f, "{p:.5}"),
            PriceTarget::Pips(p) => write!(f, "{p} pips"),
        }
    }
}

/// The oracle's proposal, as decoded by the response parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// 0..=100.
    pub confidence: f64,
    pub stop_loss: Option<PriceTarget>,
    pub take_profit: Option<PriceTarget>,
    pub reasoning: String,
}

impl Decision {
    /// The only hand-built decision: used when the oracle was not consulted
    /// or its answer could not be used.
    pub fn fallback() -> Self {
        Self {
            action: Action::Hold,
            confidence: 0.0,
            stop_loss: None,
            take_profit: None,
            reasoning: String::new(),
        }
    }
}

/// Identifier of the deterministic rule that forced a HOLD.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum GuardrailRule {
    /// BUY while the context timeframe closes below its EMA200.
    #[serde(rename = "T1")]
    BuyAgainstTrend,
    /// SELL while the context timeframe closes above its EMA200.
    #[serde(rename = "T2")]
    SellAgainstTrend,
    /// BUY while the trigger timeframe RSI is overbought.
    #[serde(rename = "R1")]
    BuyOverbought,
    /// SELL while the trigger timeframe RSI is oversold.
    #[serde(rename = "R2")]
    SellOversold,
    /// Oracle confidence below the configured minimum.
    #[serde(rename = "LOW_CONFIDENCE")]
    LowConfidence,
    /// Trigger timeframe ATR below the configured minimum; oracle skipped.
    #[serde(rename = "LOW_VOLATILITY")]
    LowVolatility,
}

impl GuardrailRule {
    pub fn code(&self) -> &'static str {
        match self {
            GuardrailRule::BuyAgainstTrend => "T1",
            GuardrailRule::SellAgainstTrend => "T2",
            GuardrailRule::BuyOverbought => "R1",
            GuardrailRule::SellOversold => "R2",
            GuardrailRule::LowConfidence => "LOW_CONFIDENCE",
            GuardrailRule::LowVolatility => "LOW_VOLATILITY",
        }
    }
}

impl std::fmt::Display for GuardrailRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of the guardrail layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    pub final_action: Action,
    pub original_action: Action,
    pub triggered_rule: Option<GuardrailRule>,
}

impl GuardrailOutcome {
    pub fn pass(action: Action) -> Self {
        Self {
            final_action: action,
            original_action: action,
            triggered_rule: None,
        }
    }

    pub fn overridden(original_action: Action, rule: GuardrailRule) -> Self {
        Self {
            final_action: Action::Hold,
            original_action,
            triggered_rule: Some(rule),
        }
    }

    pub fn is_override(&self) -> bool {
        self.triggered_rule.is_some()
    }
}

/// Pipeline stage a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Validation,
    Indicators,
    Oracle,
    Parse,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Validation => write!(f, "validation"),
            Stage::Indicators => write!(f, "indicators"),
            Stage::Oracle => write!(f, "oracle"),
            Stage::Parse => write!(f, "parse"),
        }
    }
}

/// Why an outcome was degraded to HOLD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

/// Everything returned to the caller for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub request_id: String,
    pub symbol: String,
    pub ruleset_version: String,
    #[serde(flatten)]
    pub outcome: GuardrailOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<PriceTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<PriceTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
    pub decided_at: DateTime<Utc>,
}

impl DecisionReport {
    pub fn final_action(&self) -> Action {
        self.outcome.final_action
    }

    /// True when the request was refused before any analysis took place.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self.diagnostic,
            Some(Diagnostic {
                stage: Stage::Validation,
                ..
            })
        )
    }
}

/// How requests reach the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    File,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Http => write!(f, "http"),
            Transport::File => write!(f, "file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parses_case_insensitively() {
        assert_eq!("h4".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!(" M15 ".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert!("H2".parse::<Timeframe>().is_err());
    }

    #[test]
    fn request_accepts_terminal_field_names() {
        let body = r#"{
            "symbol": "EURUSD",
            "candles_h1": [{"time": "2024.01.02 10:00", "open": 1.1, "high": 1.2, "low": 1.0, "close": 1.15, "tick_volume": 42}],
            "candles": {"H4": []}
        }"#;
        let req: AnalysisRequest = serde_json::from_str(body).unwrap();
        let h1 = req.raw_candles(Timeframe::H1).unwrap();
        assert_eq!(h1.len(), 1);
        assert_eq!(h1[0].volume, serde_json::json!(42));
        assert_eq!(req.raw_candles(Timeframe::H4).unwrap().len(), 0);
        assert!(req.raw_candles(Timeframe::D1).is_none());
    }

    #[test]
    fn guardrail_rule_serializes_as_code() {
        let json = serde_json::to_string(&GuardrailRule::BuyOverbought).unwrap();
        assert_eq!(json, "\"R1\"");
        let rule: GuardrailRule = serde_json::from_str("\"LOW_VOLATILITY\"").unwrap();
        assert_eq!(rule, GuardrailRule::LowVolatility);
    }

    #[test]
    fn report_flattens_outcome() {
        let report = DecisionReport {
            request_id: "r1".into(),
            symbol: "EURUSD".into(),
            ruleset_version: "test".into(),
            outcome: GuardrailOutcome::overridden(Action::Buy, GuardrailRule::BuyAgainstTrend),
            confidence: Some(80.0),
            stop_loss: None,
            take_profit: Some(PriceTarget::Pips(60.0)),
            reasoning: None,
            diagnostic: None,
            decided_at: Utc::now(),
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["final_action"], "HOLD");
        assert_eq!(v["original_action"], "BUY");
        assert_eq!(v["triggered_rule"], "T1");
        assert_eq!(v["take_profit"]["pips"], 60.0);
        assert!(v.get("diagnostic").is_none());
    }
}
