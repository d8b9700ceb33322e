use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::{auth::require_auth, AppState};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

pub fn decisions_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/decisions", get(get_decisions))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[derive(Deserialize)]
struct DecisionsQuery {
    limit: Option<u32>,
}

async fn get_decisions(
    State(state): State<AppState>,
    Query(q): Query<DecisionsQuery>,
) -> Response {
    let Some(journal) = state.pipeline.journal() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "decision journal is disabled"})),
        )
            .into_response();
    };

    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    match journal.recent(limit).await {
        Ok(decisions) => Json(json!({
            "decisions": decisions,
            "limit": limit,
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to read decision journal: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "journal unavailable"})),
            )
                .into_response()
        }
    }
}
