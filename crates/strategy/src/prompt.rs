use serde_json::{json, Value};

use common::OracleRequest;

use crate::config::StrategyConfig;
use crate::context::{MarketContext, TimeframeView};

/// Renders a [`MarketContext`] into the oracle request.
///
/// Output depends only on the context, the strategy config and the
/// constraint lines: no clocks, no randomness, fixed float precision. Two
/// equal contexts always render byte-identical requests.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    strategy: StrategyConfig,
    constraints: Vec<String>,
}

impl PromptBuilder {
    /// `constraints` are the hard rules the guardrail layer will enforce,
    /// stated up front so the oracle can respect them.
    pub fn new(strategy: StrategyConfig, constraints: Vec<String>) -> Self {
        Self {
            strategy,
            constraints,
        }
    }

    pub fn build(&self, ctx: &MarketContext) -> OracleRequest {
        OracleRequest {
            prompt: self.render(ctx),
            schema: decision_schema(),
        }
    }

    fn render(&self, ctx: &MarketContext) -> String {
        let trigger = self.strategy.trigger_timeframe;
        let context = self.strategy.context_timeframe;

        let mut lines = vec![
            "You are an institutional FX trader applying Smart Money Concepts.".to_string(),
            format!(
                "Analyse {} and decide whether to BUY, SELL or HOLD at the close of the current {trigger} candle.",
                ctx.symbol
            ),
            String::new(),
            "MARKET DATA".to_string(),
        ];
        lines.extend(view_lines("trend context", &ctx.context));
        lines.extend(view_lines("entry trigger", &ctx.trigger));
        if let (Some(bid), Some(ask)) = (ctx.bid, ctx.ask) {
            lines.push("[Quote]".to_string());
            lines.push(format!("- Bid: {bid:.5}"));
            lines.push(format!("- Ask: {ask:.5}"));
        }

        lines.push(String::new());
        lines.push("REASONING STEPS".to_string());
        let steps = [
            format!("Identify the market structure on {context} (higher highs and higher lows, or lower highs and lower lows) and where price sits relative to EMA200."),
            format!("On {trigger}, look for fair value gaps or market structure shifts in the recent candles."),
            format!("Compare the recent {trigger} swings with RSI(14) and note any bullish or bearish divergence."),
            format!("Calibrate stop-loss and take-profit to ATR(14) on {trigger}: stop at least 1x ATR away, target at least 1.5x the stop distance."),
            format!("Only trade in the direction of the {context} trend. Prefer HOLD when the signals conflict."),
        ];
        lines.extend(
            steps
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {step}", i + 1)),
        );

        lines.push(String::new());
        lines.push("HARD CONSTRAINTS".to_string());
        lines.extend(self.constraints.iter().map(|c| format!("- {c}")));
        lines.push("- confidence is an integer between 0 and 100.".to_string());

        lines.push(String::new());
        lines.push("OUTPUT FORMAT".to_string());
        lines.push(
            "Respond with exactly one JSON object and nothing else. Do not wrap it in markdown code fences and do not add text before or after it."
                .to_string(),
        );
        lines.push(
            r#"{"action": "BUY" | "SELL" | "HOLD", "confidence": <integer 0-100>, "stop_loss": <absolute price or null>, "take_profit": <absolute price or null>, "reasoning": "<one or two sentences>"}"#
                .to_string(),
        );
        lines.join("\n")
    }
}

fn view_lines(role: &str, view: &TimeframeView) -> Vec<String> {
    let s = &view.snapshot;
    let mut lines = vec![
        format!("[{} - {role}]", s.timeframe),
        format!("- Last close: {:.5}", s.close),
        format!(
            "- EMA20: {:.5} | EMA50: {:.5} | EMA200: {:.5}",
            s.ema20, s.ema50, s.ema200
        ),
        format!("- Trend vs EMA200: {}", s.trend),
        format!("- RSI(14): {:.2}", s.rsi14),
        format!("- ATR(14): {:.5}", s.atr14),
        "- Recent candles (oldest first):".to_string(),
    ];
    lines.extend(view.recent.iter().map(|rc| {
        let c = &rc.candle;
        let rsi = rc
            .rsi14
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "  {} O={:.5} H={:.5} L={:.5} C={:.5} RSI={rsi}",
            c.timestamp.format("%Y-%m-%d %H:%M"),
            c.open,
            c.high,
            c.low,
            c.close
        )
    }));
    lines
}

/// JSON schema of the expected reply, in the OpenAPI subset accepted by
/// structured-output text-generation APIs.
pub fn decision_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "action": { "type": "STRING", "enum": ["BUY", "SELL", "HOLD"] },
            "confidence": { "type": "NUMBER" },
            "stop_loss": { "type": "NUMBER", "nullable": true },
            "take_profit": { "type": "NUMBER", "nullable": true },
            "reasoning": { "type": "STRING" }
        },
        "required": ["action", "confidence", "reasoning"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RecentCandle;
    use crate::indicators::IndicatorSnapshot;
    use chrono::{TimeZone, Utc};
    use common::{Candle, Timeframe, Trend};

    fn view(tf: Timeframe, close: f64, ema200: f64, rsi: f64) -> TimeframeView {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap();
        TimeframeView {
            snapshot: IndicatorSnapshot {
                timeframe: tf,
                timestamp: ts,
                close,
                ema20: close - 0.001,
                ema50: close - 0.002,
                ema200,
                rsi14: rsi,
                atr14: 0.0012,
                trend: IndicatorSnapshot::trend_of(close, ema200),
            },
            recent: vec![RecentCandle {
                candle: Candle {
                    timestamp: ts,
                    open: close - 0.0005,
                    high: close + 0.0010,
                    low: close - 0.0010,
                    close,
                    volume: Some(1500.0),
                },
                rsi14: Some(rsi),
            }],
        }
    }

    fn context() -> MarketContext {
        MarketContext::new(
            "EURUSD",
            view(Timeframe::H1, 1.2, 1.19, 55.0),
            view(Timeframe::H4, 1.2, 1.195, 61.0),
        )
    }

    fn builder() -> PromptBuilder {
        PromptBuilder::new(
            StrategyConfig::default(),
            vec!["Do not BUY while the H4 close is below EMA200.".to_string()],
        )
    }

    #[test]
    fn identical_context_renders_identical_request() {
        let a = builder().build(&context());
        let b = builder().build(&context());
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn prompt_enumerates_data_steps_constraints_and_schema() {
        let req = builder().build(&context());
        let p = &req.prompt;
        assert!(p.contains("EURUSD"));
        assert!(p.contains("[H4 - trend context]"));
        assert!(p.contains("[H1 - entry trigger]"));
        assert!(p.contains("EMA200: 1.19500"));
        assert!(p.contains("RSI(14): 55.00"));
        assert!(p.contains("Trend vs EMA200: UP"));
        assert!(p.contains("REASONING STEPS"));
        assert!(p.contains("divergence"));
        assert!(p.contains("- Do not BUY while the H4 close is below EMA200."));
        assert!(p.contains("Do not wrap it in markdown code fences"));
        assert!(p.contains(r#""action": "BUY" | "SELL" | "HOLD""#));
        assert!(!p.contains("Bid:"));
        assert_eq!(req.schema["properties"]["action"]["enum"][2], "HOLD");
    }

    #[test]
    fn quote_rendered_when_present() {
        let ctx = context().with_quote(Some(1.20001), Some(1.20011));
        let p = builder().build(&ctx).prompt;
        assert!(p.contains("- Bid: 1.20001"));
        assert!(p.contains("- Ask: 1.20011"));
    }

    #[test]
    fn sections_are_separated_by_blank_lines() {
        let p = builder().build(&context()).prompt;
        for heading in ["MARKET DATA", "REASONING STEPS", "HARD CONSTRAINTS", "OUTPUT FORMAT"] {
            assert!(p.contains(&format!("\n\n{heading}\n")), "missing {heading}");
        }
        assert!(p.contains("1. Identify the market structure on H4"));
        assert!(p.contains("  2024-05-06 12:00 O=1.19950"));
        assert!(p.ends_with("\"<one or two sentences>\"}"));
    }

    #[test]
    fn context_timeframe_listed_before_trigger() {
        let p = builder().build(&context()).prompt;
        let h4 = p.find("[H4").unwrap();
        let h1 = p.find("[H1").unwrap();
        assert!(h4 < h1);
        assert_eq!(context().context.snapshot.trend, Trend::Up);
    }
}
