use serde::{Deserialize, Serialize};

use common::{Error, Result};
use risk::GuardrailConfig;
use strategy::StrategyConfig;

/// The versioned ruleset file (TOML): strategy parameters plus guardrails.
///
/// Example `config/ruleset.toml`:
/// ```toml
/// version = "2025.1"
///
/// [strategy]
/// trigger_timeframe = "H1"
/// context_timeframe = "H4"
/// pattern_window = 5
///
/// [guardrails]
/// rules = ["T1", "T2", "R1", "R2"]
/// rsi_overbought = 70.0
/// rsi_oversold = 30.0
/// min_atr = 0.0005
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub version: String,
    pub strategy: StrategyConfig,
    pub guardrails: GuardrailConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: "default".to_string(),
            strategy: StrategyConfig::default(),
            guardrails: GuardrailConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a ruleset file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read ruleset at '{path}': {e}")))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("invalid ruleset at '{path}': {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.strategy;
        let g = &self.guardrails;
        if s.trigger_timeframe == s.context_timeframe {
            return Err(Error::Config(format!(
                "trigger and context timeframe are both {}",
                s.trigger_timeframe
            )));
        }
        if s.pattern_window == 0 {
            return Err(Error::Config("pattern_window must be at least 1".into()));
        }
        if !(0.0..=100.0).contains(&g.rsi_oversold)
            || !(0.0..=100.0).contains(&g.rsi_overbought)
            || g.rsi_oversold >= g.rsi_overbought
        {
            return Err(Error::Config(format!(
                "RSI thresholds must satisfy 0 <= oversold < overbought <= 100, got {} / {}",
                g.rsi_oversold, g.rsi_overbought
            )));
        }
        if g.min_atr.is_some_and(|v| !v.is_finite() || v < 0.0) {
            return Err(Error::Config("min_atr must be a non-negative number".into()));
        }
        if g.min_confidence.is_some_and(|v| !(0.0..=100.0).contains(&v)) {
            return Err(Error::Config("min_confidence must be within [0, 100]".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{GuardrailRule, Timeframe};

    #[test]
    fn parses_full_ruleset() {
        let cfg = PipelineConfig::from_toml(
            r#"
            version = "2025.1"
            [strategy]
            trigger_timeframe = "M15"
            context_timeframe = "H1"
            pattern_window = 3
            [guardrails]
            rules = ["R1", "T1"]
            rsi_overbought = 75.0
            rsi_oversold = 25.0
            min_atr = 0.0005
            min_confidence = 85.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.version, "2025.1");
        assert_eq!(cfg.strategy.trigger_timeframe, Timeframe::M15);
        assert_eq!(cfg.strategy.pattern_window, 3);
        assert_eq!(
            cfg.guardrails.rules,
            vec![GuardrailRule::BuyOverbought, GuardrailRule::BuyAgainstTrend]
        );
        assert_eq!(cfg.guardrails.min_atr, Some(0.0005));
        assert_eq!(cfg.guardrails.min_confidence, Some(85.0));
    }

    #[test]
    fn partial_file_uses_defaults() {
        let cfg = PipelineConfig::from_toml("version = \"x\"").unwrap();
        assert_eq!(cfg.strategy, StrategyConfig::default());
        assert_eq!(cfg.guardrails, GuardrailConfig::default());
        assert_eq!(cfg.guardrails.rules.len(), 4);
    }

    #[test]
    fn rejects_inconsistent_ruleset() {
        let same_tf = "[strategy]\ntrigger_timeframe = \"H4\"\ncontext_timeframe = \"H4\"";
        assert!(matches!(PipelineConfig::from_toml(same_tf), Err(Error::Config(_))));

        let inverted = "[guardrails]\nrsi_overbought = 30.0\nrsi_oversold = 70.0";
        assert!(matches!(PipelineConfig::from_toml(inverted), Err(Error::Config(_))));

        let unknown_rule = "[guardrails]\nrules = [\"X9\"]";
        assert!(matches!(PipelineConfig::from_toml(unknown_rule), Err(Error::Config(_))));
    }

    #[test]
    fn shipped_ruleset_is_valid() {
        let cfg = PipelineConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/ruleset.toml"))
            .unwrap();
        assert_eq!(cfg.guardrails.min_atr, Some(0.0005));
        assert_eq!(cfg.guardrails.min_confidence, None);
    }

    #[test]
    fn missing_file_is_config_error() {
        assert!(matches!(
            PipelineConfig::load("/nonexistent/ruleset.toml"),
            Err(Error::Config(_))
        ));
    }
}
