pub mod guardrail;

pub use guardrail::{GuardrailConfig, GuardrailFilter, TREND_AND_MOMENTUM_RULES};
