use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, Transport};
use engine::{DecisionJournal, DecisionPipeline, FileBridge, GeminiClient, PipelineConfig, MIGRATOR};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let ruleset = PipelineConfig::load(&cfg.ruleset_path)
        .unwrap_or_else(|e| panic!("Failed to load ruleset: {e}"));
    info!(
        transport = %cfg.transport,
        ruleset = %ruleset.version,
        model = %cfg.oracle_model,
        "Aegis starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    MIGRATOR
        .run(&db)
        .await
        .unwrap_or_else(|e| panic!("Database migration failed: {e}"));
    info!("Decision journal ready");

    // ── Oracle + pipeline ─────────────────────────────────────────────────────
    let oracle = GeminiClient::new(
        &cfg.oracle_api_key,
        &cfg.oracle_model,
        &cfg.oracle_base_url,
        cfg.oracle_timeout,
    )
    .unwrap_or_else(|e| panic!("Failed to build oracle client: {e}"));
    let pipeline = Arc::new(
        DecisionPipeline::new(Arc::new(oracle), ruleset).with_journal(DecisionJournal::new(db)),
    );

    // ── Transport ─────────────────────────────────────────────────────────────
    let server = match cfg.transport {
        Transport::Http => {
            let state = api::AppState {
                pipeline,
                api_token: cfg.api_token.clone(),
            };
            let port = cfg.port;
            tokio::spawn(async move {
                if let Err(e) = api::serve(state, port).await {
                    error!("HTTP server stopped: {e}");
                }
            })
        }
        Transport::File => {
            let bridge = FileBridge::new(
                pipeline,
                &cfg.bridge_input_path,
                &cfg.bridge_output_path,
                cfg.bridge_poll_interval,
            );
            tokio::spawn(bridge.run())
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received. Exiting."),
        _ = server => error!("Transport task exited unexpectedly"),
    }
}
