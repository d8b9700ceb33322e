use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use api::{router, AppState};
use common::{OracleClient, OracleRequest, Result};
use engine::{DecisionJournal, DecisionPipeline, PipelineConfig, MIGRATOR};

const TOKEN: &str = "s3cret";

struct HoldOracle;

#[async_trait]
impl OracleClient for HoldOracle {
    async fn submit(&self, _request: &OracleRequest) -> Result<String> {
        Ok(r#"{"action":"HOLD","confidence":40,"reasoning":"No clear structure"}"#.to_string())
    }

    fn name(&self) -> &str {
        "hold-oracle"
    }
}

fn rising(n: usize, step: i64) -> Value {
    let bars: Vec<Value> = (0..n)
        .map(|i| {
            let c = 1.10 + i as f64 * 0.0005;
            json!({
                "time": 1_700_000_000 + i as i64 * step,
                "open": c - 0.0002,
                "high": c + 0.0008,
                "low": c - 0.0008,
                "close": c,
            })
        })
        .collect();
    Value::Array(bars)
}

async fn app(with_journal: bool) -> Router {
    let mut pipeline = DecisionPipeline::new(Arc::new(HoldOracle), PipelineConfig::default());
    if with_journal {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();
        pipeline = pipeline.with_journal(DecisionJournal::new(pool));
    }
    router(AppState {
        pipeline: Arc::new(pipeline),
        api_token: TOKEN.to_string(),
    })
}

fn post_analyze(body: String) -> Request<Body> {
    Request::post("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_reports_ruleset_and_oracle() {
    let resp = app(false)
        .await
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["oracle"], "hold-oracle");
    assert_eq!(body["ruleset_version"], "default");
    assert_eq!(body["journal"], false);
}

#[tokio::test]
async fn analyze_returns_report() {
    let req = json!({
        "symbol": "EURUSD",
        "candles_h1": rising(220, 3_600),
        "candles_h4": rising(220, 14_400),
    });
    let resp = app(false)
        .await
        .oneshot(post_analyze(req.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["final_action"], "HOLD");
    assert_eq!(body["original_action"], "HOLD");
    assert_eq!(body["triggered_rule"], Value::Null);
    assert_eq!(body["confidence"], 40.0);
    assert_eq!(body["symbol"], "EURUSD");
    assert!(body.get("diagnostic").is_none());
}

#[tokio::test]
async fn rejected_candles_return_422() {
    let req = json!({
        "symbol": "EURUSD",
        "candles_h1": rising(50, 3_600),
        "candles_h4": rising(220, 14_400),
    });
    let resp = app(false)
        .await
        .oneshot(post_analyze(req.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(resp).await;
    assert_eq!(body["final_action"], "HOLD");
    assert_eq!(body["diagnostic"]["stage"], "VALIDATION");
    assert_eq!(body["diagnostic"]["kind"], "INSUFFICIENT_DATA");
}

#[tokio::test]
async fn undecodable_body_returns_400() {
    let resp = app(false)
        .await
        .oneshot(post_analyze("{not json".to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn decisions_require_bearer_token() {
    let app = app(true).await;

    let anonymous = app
        .clone()
        .oneshot(Request::get("/api/decisions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .oneshot(
            Request::get("/api/decisions")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn decisions_list_journaled_reports() {
    let app = app(true).await;
    let req = json!({
        "symbol": "GBPUSD",
        "candles_h1": rising(220, 3_600),
        "candles_h4": rising(220, 14_400),
    });
    let resp = app
        .clone()
        .oneshot(post_analyze(req.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(
            Request::get("/api/decisions?limit=500")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["limit"], 200);
    let decisions = body["decisions"].as_array().unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0]["symbol"], "GBPUSD");
    assert_eq!(decisions[0]["final_action"], "HOLD");
}

#[tokio::test]
async fn decisions_without_journal_is_unavailable() {
    let resp = app(false)
        .await
        .oneshot(
            Request::get("/api/decisions")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
