use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use common::{Action, Decision, Error, PriceTarget, Result};

/// Longest reasoning text kept from a reply, in characters.
pub const MAX_REASONING_CHARS: usize = 500;

/// Reply fields as decoded before validation. Aliases cover field names used
/// by earlier prompt revisions (`decision`, `sl_pips`, `tp_pips`).
#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(alias = "decision")]
    action: Option<Value>,
    confidence: Option<Value>,
    stop_loss: Option<Value>,
    take_profit: Option<Value>,
    sl_pips: Option<Value>,
    tp_pips: Option<Value>,
    reasoning: Option<Value>,
}

/// Parse the oracle's raw reply into a [`Decision`].
///
/// Code fences and prose around the outermost JSON object are removed before
/// decoding. An action outside BUY/SELL/HOLD becomes HOLD. A reply without a
/// JSON object, without `action`, or with a confidence outside `[0, 100]`
/// fails with `Error::ResponseParse`.
pub fn parse_decision(raw: &str) -> Result<Decision> {
    let body = json_object(strip_fences(raw))
        .ok_or_else(|| Error::ResponseParse("no JSON object in oracle reply".into()))?;

    let fields: RawDecision =
        serde_json::from_str(body).map_err(|e| Error::ResponseParse(e.to_string()))?;

    let action = match fields.action {
        None | Some(Value::Null) => {
            return Err(Error::ResponseParse("missing field 'action'".into()));
        }
        Some(value) => decode_action(&value),
    };

    let confidence = match fields.confidence {
        None | Some(Value::Null) => 0.0,
        Some(value) => {
            let c = number(&value).ok_or_else(|| {
                Error::ResponseParse(format!("confidence is not a number: {value}"))
            })?;
            if !c.is_finite() || !(0.0..=100.0).contains(&c) {
                return Err(Error::ResponseParse(format!(
                    "confidence {c} outside [0, 100]"
                )));
            }
            c
        }
    };

    let stop_loss = target(fields.stop_loss.as_ref(), PriceTarget::Price)
        .or_else(|| target(fields.sl_pips.as_ref(), PriceTarget::Pips));
    let take_profit = target(fields.take_profit.as_ref(), PriceTarget::Price)
        .or_else(|| target(fields.tp_pips.as_ref(), PriceTarget::Pips));

    let reasoning = match fields.reasoning {
        Some(Value::String(s)) => s.trim().chars().take(MAX_REASONING_CHARS).collect(),
        _ => String::new(),
    };

    Ok(Decision {
        action,
        confidence,
        stop_loss,
        take_profit,
        reasoning,
    })
}

fn decode_action(value: &Value) -> Action {
    let label = value.as_str().map(|s| s.trim().to_uppercase());
    match label.as_deref() {
        Some("BUY") => Action::Buy,
        Some("SELL") => Action::Sell,
        Some("HOLD") => Action::Hold,
        _ => {
            warn!(action = %value, "Oracle returned unknown action, coercing to HOLD");
            Action::Hold
        }
    }
}

/// Remove a surrounding markdown code fence, with or without a language tag.
fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Slice from the first `{` to the last `}`.
fn json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (start < end).then(|| &s[start..=end])
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn target(value: Option<&Value>, make: fn(f64) -> PriceTarget) -> Option<PriceTarget> {
    value
        .and_then(number)
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(make)
}
