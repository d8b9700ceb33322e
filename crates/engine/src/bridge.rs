use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::{Action, AnalysisRequest, DecisionReport, GuardrailRule, PriceTarget, Result};

use crate::pipeline::DecisionPipeline;

/// What the terminal-side expert advisor reads back from the command file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeCommand {
    pub request_id: String,
    pub symbol: String,
    pub action: Action,
    pub confidence: Option<f64>,
    pub stop_loss: Option<PriceTarget>,
    pub take_profit: Option<PriceTarget>,
    pub triggered_rule: Option<GuardrailRule>,
    pub issued_at: DateTime<Utc>,
}

impl From<&DecisionReport> for BridgeCommand {
    fn from(report: &DecisionReport) -> Self {
        let acting = report.final_action() != Action::Hold;
        Self {
            request_id: report.request_id.clone(),
            symbol: report.symbol.clone(),
            action: report.final_action(),
            confidence: report.confidence,
            stop_loss: report.stop_loss.filter(|_| acting),
            take_profit: report.take_profit.filter(|_| acting),
            triggered_rule: report.outcome.triggered_rule,
            issued_at: report.decided_at,
        }
    }
}

/// File-based transport for terminals that cannot make HTTP calls.
///
/// The terminal writes an [`AnalysisRequest`] as JSON to `input`; each time
/// its content changes the pipeline runs once and a [`BridgeCommand`] is
/// written to `output` (temp file, then rename). Requests are processed one
/// at a time.
pub struct FileBridge {
    pipeline: Arc<DecisionPipeline>,
    input: PathBuf,
    output: PathBuf,
    poll_interval: Duration,
    /// Input whose command has been written (or which failed to decode).
    last_input: Option<String>,
    /// Input and report whose command write failed.
    pending: Option<(String, DecisionReport)>,
}

impl FileBridge {
    pub fn new(
        pipeline: Arc<DecisionPipeline>,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pipeline,
            input: input.into(),
            output: output.into(),
            poll_interval,
            last_input: None,
            pending: None,
        }
    }

    /// Poll forever. Call from `tokio::spawn` or race against a shutdown signal.
    pub async fn run(mut self) {
        info!(
            input = %self.input.display(),
            output = %self.output.display(),
            "File bridge polling every {:?}",
            self.poll_interval
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(Some(report)) => debug!(
                    request_id = %report.request_id,
                    "Bridge command written"
                ),
                Ok(None) => {}
                Err(e) => warn!(input = %self.input.display(), "Bridge poll failed: {e}"),
            }
        }
    }

    /// Process the input file if it holds a request not yet answered.
    /// Returns the report when a command was written.
    ///
    /// An input counts as answered once its command is on disk. If the write
    /// fails, the report is kept and the write is retried on the next poll
    /// without running the pipeline again. Malformed input is answered by
    /// the decode error and not retried until the file changes.
    pub async fn poll_once(&mut self) -> Result<Option<DecisionReport>> {
        let content = match tokio::fs::read_to_string(&self.input).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() || self.last_input.as_deref() == Some(content.as_str()) {
            return Ok(None);
        }

        let report = match self.pending.take() {
            Some((input, report)) if input == content => report,
            _ => {
                let request: AnalysisRequest = match serde_json::from_str(&content) {
                    Ok(r) => r,
                    Err(e) => {
                        self.last_input = Some(content);
                        return Err(e.into());
                    }
                };
                self.pipeline.analyze(&request).await
            }
        };

        if let Err(e) = self.write_command(&BridgeCommand::from(&report)).await {
            self.pending = Some((content, report));
            return Err(e);
        }
        self.last_input = Some(content);
        Ok(Some(report))
    }

    async fn write_command(&self, command: &BridgeCommand) -> Result<()> {
        if let Some(dir) = self.output.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let body = serde_json::to_vec_pretty(command)?;
        let tmp = self.output.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.output).await?;
        Ok(())
    }
}
