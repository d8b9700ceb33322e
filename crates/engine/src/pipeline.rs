use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{
    Action, AnalysisRequest, Decision, DecisionReport, Diagnostic, Error, GuardrailOutcome,
    OracleClient, Stage, Timeframe,
};
use risk::GuardrailFilter;
use strategy::{
    analyze, parse_decision, CandleSeries, MarketContext, PromptBuilder, TimeframeView,
    REQUIRED_LOOKBACK,
};

use crate::config::PipelineConfig;
use crate::journal::DecisionJournal;

/// A stage error on its way to becoming a HOLD outcome.
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    error: Error,
}

fn at(stage: Stage) -> impl FnOnce(Error) -> StageFailure {
    move |error| StageFailure { stage, error }
}

/// What the stages produced when none of them failed.
struct Evaluation {
    outcome: GuardrailOutcome,
    /// `None` when the oracle was skipped.
    decision: Option<Decision>,
}

/// Request to report: validation, indicators, context, prompt, oracle,
/// parse, guardrails.
///
/// Stateless between requests apart from the optional journal. Stage errors
/// never escape [`DecisionPipeline::analyze`]; they are turned into a HOLD
/// report with a [`Diagnostic`] in exactly one place.
pub struct DecisionPipeline {
    oracle: Arc<dyn OracleClient>,
    config: PipelineConfig,
    prompt: PromptBuilder,
    guardrails: GuardrailFilter,
    journal: Option<DecisionJournal>,
}

impl DecisionPipeline {
    pub fn new(oracle: Arc<dyn OracleClient>, config: PipelineConfig) -> Self {
        let guardrails = GuardrailFilter::new(config.guardrails.clone());
        let constraints = guardrails.constraints(
            config.strategy.trigger_timeframe,
            config.strategy.context_timeframe,
        );
        let prompt = PromptBuilder::new(config.strategy.clone(), constraints);
        Self {
            oracle,
            config,
            prompt,
            guardrails,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: DecisionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn ruleset_version(&self) -> &str {
        &self.config.version
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub fn journal(&self) -> Option<&DecisionJournal> {
        self.journal.as_ref()
    }

    /// Run one request to completion. Always returns a report: any failure
    /// yields final action HOLD plus the failing stage and reason.
    pub async fn analyze(&self, request: &AnalysisRequest) -> DecisionReport {
        let request_id = Uuid::new_v4().to_string();

        let report = match self.evaluate(request).await {
            Ok(eval) => self.report(request_id, request, eval.outcome, eval.decision, None),
            Err(StageFailure { stage, error }) => {
                warn!(
                    request_id = %request_id,
                    symbol = %request.symbol,
                    stage = %stage,
                    error = %error,
                    "Stage failed, returning HOLD"
                );
                let diagnostic = Diagnostic {
                    stage,
                    kind: error.kind(),
                    message: error.to_string(),
                };
                self.report(
                    request_id,
                    request,
                    GuardrailOutcome::pass(Action::Hold),
                    None,
                    Some(diagnostic),
                )
            }
        };

        info!(
            request_id = %report.request_id,
            symbol = %report.symbol,
            action = %report.final_action(),
            original = %report.outcome.original_action,
            rule = ?report.outcome.triggered_rule,
            "Decision"
        );

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record(&report).await {
                error!(request_id = %report.request_id, "Failed to journal decision: {e}");
            }
        }
        report
    }

    async fn evaluate(&self, request: &AnalysisRequest) -> Result<Evaluation, StageFailure> {
        let strategy = &self.config.strategy;

        if request.symbol.trim().is_empty() {
            return Err(StageFailure {
                stage: Stage::Validation,
                error: Error::DataFormat("missing field 'symbol'".into()),
            });
        }
        let trigger_series =
            load_series(request, strategy.trigger_timeframe).map_err(at(Stage::Validation))?;
        let context_series =
            load_series(request, strategy.context_timeframe).map_err(at(Stage::Validation))?;

        let trigger = analyze(&trigger_series).map_err(at(Stage::Indicators))?;
        let context = analyze(&context_series).map_err(at(Stage::Indicators))?;

        if let Some(rule) = self.guardrails.check_volatility(&trigger.snapshot) {
            return Ok(Evaluation {
                outcome: GuardrailOutcome::overridden(Action::Hold, rule),
                decision: None,
            });
        }

        let ctx = MarketContext::new(
            request.symbol.trim(),
            TimeframeView::new(&trigger_series, &trigger, strategy.pattern_window),
            TimeframeView::new(&context_series, &context, strategy.pattern_window),
        )
        .with_quote(request.bid, request.ask);

        let oracle_request = self.prompt.build(&ctx);
        debug!(
            oracle = %self.oracle.name(),
            prompt_len = oracle_request.prompt.len(),
            "Consulting oracle"
        );
        let raw = self
            .oracle
            .submit(&oracle_request)
            .await
            .map_err(at(Stage::Oracle))?;
        let decision = parse_decision(&raw).map_err(at(Stage::Parse))?;

        let outcome = self.guardrails.apply(&decision, &ctx);
        Ok(Evaluation {
            outcome,
            decision: Some(decision),
        })
    }

    fn report(
        &self,
        request_id: String,
        request: &AnalysisRequest,
        outcome: GuardrailOutcome,
        decision: Option<Decision>,
        diagnostic: Option<Diagnostic>,
    ) -> DecisionReport {
        let (confidence, stop_loss, take_profit, reasoning) = match decision {
            Some(d) => (
                Some(d.confidence),
                d.stop_loss,
                d.take_profit,
                Some(d.reasoning).filter(|r| !r.is_empty()),
            ),
            None => (None, None, None, None),
        };
        DecisionReport {
            request_id,
            symbol: request.symbol.trim().to_string(),
            ruleset_version: self.config.version.clone(),
            outcome,
            confidence,
            stop_loss,
            take_profit,
            reasoning,
            diagnostic,
            decided_at: Utc::now(),
        }
    }
}

fn load_series(request: &AnalysisRequest, timeframe: Timeframe) -> common::Result<CandleSeries> {
    let raw = request
        .raw_candles(timeframe)
        .ok_or_else(|| Error::DataFormat(format!("no {timeframe} candles in request")))?;
    CandleSeries::validate(timeframe, &raw, REQUIRED_LOOKBACK)
}
