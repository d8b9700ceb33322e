use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Liveness check, no auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let pipeline = &state.pipeline;
    Json(json!({
        "status": "ok",
        "oracle": pipeline.oracle_name(),
        "ruleset_version": pipeline.ruleset_version(),
        "journal": pipeline.journal().is_some(),
    }))
}
