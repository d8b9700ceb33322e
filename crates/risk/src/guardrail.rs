use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{Action, Decision, GuardrailOutcome, GuardrailRule, Timeframe};
use strategy::{IndicatorSnapshot, MarketContext};

/// Rules that `rules` in the config may enable, in evaluation order.
pub const TREND_AND_MOMENTUM_RULES: [GuardrailRule; 4] = [
    GuardrailRule::BuyAgainstTrend,
    GuardrailRule::SellAgainstTrend,
    GuardrailRule::BuyOverbought,
    GuardrailRule::SellOversold,
];

/// `[guardrails]` section of the ruleset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Enabled trend/momentum rules. Order here is irrelevant: rules always
    /// run as T1, T2, R1, R2.
    pub rules: Vec<GuardrailRule>,
    /// R1 fires when the trigger RSI is strictly above this.
    pub rsi_overbought: f64,
    /// R2 fires when the trigger RSI is strictly below this.
    pub rsi_oversold: f64,
    /// Pre-oracle volatility floor for the trigger ATR(14). `None` disables it.
    pub min_atr: Option<f64>,
    /// Minimum oracle confidence to act on. `None` disables the gate.
    pub min_confidence: Option<f64>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            rules: TREND_AND_MOMENTUM_RULES.to_vec(),
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            min_atr: None,
            min_confidence: None,
        }
    }
}

/// Deterministic safety layer between the oracle and the caller.
///
/// Pure and total: every `(Decision, MarketContext)` yields exactly one
/// outcome. The first matching rule forces HOLD; otherwise the oracle's
/// action passes through.
#[derive(Debug, Clone)]
pub struct GuardrailFilter {
    config: GuardrailConfig,
    order: Vec<GuardrailRule>,
}

impl GuardrailFilter {
    pub fn new(config: GuardrailConfig) -> Self {
        let mut order: Vec<GuardrailRule> = config
            .rules
            .iter()
            .copied()
            .filter(|r| TREND_AND_MOMENTUM_RULES.contains(r))
            .collect();
        order.sort();
        order.dedup();
        if config.min_confidence.is_some() {
            order.push(GuardrailRule::LowConfidence);
        }
        Self { config, order }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Post-oracle rules in evaluation order.
    pub fn rules(&self) -> &[GuardrailRule] {
        &self.order
    }

    /// Pre-oracle filter: `Some(LowVolatility)` when the trigger ATR is below
    /// the configured floor.
    pub fn check_volatility(&self, trigger: &IndicatorSnapshot) -> Option<GuardrailRule> {
        let min_atr = self.config.min_atr?;
        if trigger.atr14 < min_atr {
            info!(
                timeframe = %trigger.timeframe,
                atr = trigger.atr14,
                min_atr,
                "Volatility below floor, skipping oracle"
            );
            return Some(GuardrailRule::LowVolatility);
        }
        None
    }

    /// Whether `rule` would override `decision` in `ctx`.
    pub fn matches(&self, rule: GuardrailRule, decision: &Decision, ctx: &MarketContext) -> bool {
        let trend = &ctx.context.snapshot;
        let trigger = &ctx.trigger.snapshot;
        match (rule, decision.action) {
            (GuardrailRule::BuyAgainstTrend, Action::Buy) => trend.close < trend.ema200,
            (GuardrailRule::SellAgainstTrend, Action::Sell) => trend.close > trend.ema200,
            (GuardrailRule::BuyOverbought, Action::Buy) => {
                trigger.rsi14 > self.config.rsi_overbought
            }
            (GuardrailRule::SellOversold, Action::Sell) => {
                trigger.rsi14 < self.config.rsi_oversold
            }
            (GuardrailRule::LowConfidence, Action::Buy | Action::Sell) => self
                .config
                .min_confidence
                .is_some_and(|min| decision.confidence < min),
            _ => false,
        }
    }

    pub fn apply(&self, decision: &Decision, ctx: &MarketContext) -> GuardrailOutcome {
        match self
            .order
            .iter()
            .copied()
            .find(|&rule| self.matches(rule, decision, ctx))
        {
            Some(rule) => {
                warn!(
                    symbol = %ctx.symbol,
                    rule = %rule,
                    original = %decision.action,
                    "Guardrail override to HOLD"
                );
                GuardrailOutcome::overridden(decision.action, rule)
            }
            None => GuardrailOutcome::pass(decision.action),
        }
    }

    /// Plain-language statement of every enabled post-oracle rule, for the
    /// prompt's hard-constraint section.
    pub fn constraints(&self, trigger: Timeframe, context: Timeframe) -> Vec<String> {
        self.order
            .iter()
            .map(|rule| match rule {
                GuardrailRule::BuyAgainstTrend => {
                    format!("Do not BUY while the {context} close is below EMA200.")
                }
                GuardrailRule::SellAgainstTrend => {
                    format!("Do not SELL while the {context} close is above EMA200.")
                }
                GuardrailRule::BuyOverbought => format!(
                    "Do not BUY while {trigger} RSI(14) is above {:.0}.",
                    self.config.rsi_overbought
                ),
                GuardrailRule::SellOversold => format!(
                    "Do not SELL while {trigger} RSI(14) is below {:.0}.",
                    self.config.rsi_oversold
                ),
                GuardrailRule::LowConfidence => format!(
                    "BUY or SELL requires confidence of at least {:.0}.",
                    self.config.min_confidence.unwrap_or_default()
                ),
                GuardrailRule::LowVolatility => String::new(),
            })
            .filter(|line| !line.is_empty())
            .collect()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
