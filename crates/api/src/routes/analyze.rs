use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::warn;

use common::AnalysisRequest;

use crate::AppState;

pub fn analyze_router() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}

/// Run the decision pipeline on one market snapshot.
///
/// 200 with the report for any outcome past validation (including HOLDs
/// caused by oracle or parse failures), 422 when the candles were rejected,
/// 400 when the body is not a decodable request.
async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected /analyze body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };

    let report = state.pipeline.analyze(&request).await;
    let status = if report.is_rejected() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    (status, Json(report)).into_response()
}
