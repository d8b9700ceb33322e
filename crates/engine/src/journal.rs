use chrono::SecondsFormat;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::SqlitePool;

use common::{Action, DecisionReport, Result};

/// Schema migrations for the decision journal.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// One persisted decision, as read back for the API.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct JournalEntry {
    pub id: String,
    pub symbol: String,
    pub ruleset_version: String,
    pub final_action: Action,
    pub original_action: Action,
    pub triggered_rule: Option<String>,
    pub confidence: Option<f64>,
    /// JSON-encoded `PriceTarget`, e.g. `{"price":1.195}`.
    pub stop_loss: Option<String>,
    pub take_profit: Option<String>,
    pub reasoning: Option<String>,
    pub diagnostic: Option<String>,
    pub decided_at: String,
}

/// Append-only SQLite audit trail of decision reports.
#[derive(Clone)]
pub struct DecisionJournal {
    db: SqlitePool,
}

impl DecisionJournal {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn record(&self, report: &DecisionReport) -> Result<()> {
        let triggered_rule = report.outcome.triggered_rule.map(|r| r.code().to_string());
        let stop_loss = report.stop_loss.as_ref().map(serde_json::to_string).transpose()?;
        let take_profit = report.take_profit.as_ref().map(serde_json::to_string).transpose()?;
        let diagnostic = report
            .diagnostic
            .as_ref()
            .map(|d| format!("{}: {}", d.stage, d.message));
        let decided_at = report
            .decided_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r#"
            INSERT INTO decisions (
                id, symbol, ruleset_version, final_action, original_action, triggered_rule,
                confidence, stop_loss, take_profit, reasoning, diagnostic, decided_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(report.request_id.as_str())
        .bind(report.symbol.as_str())
        .bind(report.ruleset_version.as_str())
        .bind(report.outcome.final_action)
        .bind(report.outcome.original_action)
        .bind(triggered_rule)
        .bind(report.confidence)
        .bind(stop_loss)
        .bind(take_profit)
        .bind(report.reasoning.as_deref())
        .bind(diagnostic)
        .bind(decided_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Most recent decisions, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, symbol, ruleset_version, final_action, original_action, triggered_rule,
                   confidence, stop_loss, take_profit, reasoning, diagnostic, decided_at
            FROM decisions
            ORDER BY decided_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
