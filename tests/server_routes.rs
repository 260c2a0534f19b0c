use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use lyrics_sentiment::gateway::{ChatRequest, ChatResponse, ProviderError};
use lyrics_sentiment::server::{build_router, AppState};
use lyrics_sentiment::{AnalyzerConfig, ChatGateway, LyricsAnalyzer, RetryPolicy};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Gateway that annotates each enumerated line and returns a fixed summary.
struct CannedGateway {
    calls: AtomicUsize,
    overall: Value,
}

#[async_trait::async_trait]
impl ChatGateway for CannedGateway {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if req.messages[0].content.starts_with("Summarize") {
            return Ok(ChatResponse::from_content(
                json!({ "overall": self.overall }).to_string(),
            ));
        }

        let count = req.messages[1]
            .content
            .lines()
            .filter(|l| {
                l.split_once(". ")
                    .is_some_and(|(n, _)| n.parse::<u32>().is_ok())
            })
            .count();
        let items: Vec<Value> = (1..=count)
            .map(|n| {
                json!({
                    "lineNo": n,
                    "text": "",
                    "sentiment": "neutral",
                    "emotions": {},
                    "intensity": 0.5
                })
            })
            .collect();
        Ok(ChatResponse::from_content(
            json!({ "per_line": items }).to_string(),
        ))
    }
}

fn app(overall: Value) -> (Arc<CannedGateway>, axum::Router) {
    let gateway = Arc::new(CannedGateway {
        calls: AtomicUsize::new(0),
        overall,
    });
    let config = AnalyzerConfig {
        retry: RetryPolicy::immediate(0),
        ..AnalyzerConfig::default()
    };
    let analyzer = LyricsAnalyzer::new(gateway.clone(), config);
    (gateway, build_router(AppState::new(Arc::new(analyzer))))
}

fn post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn ok_overall() -> Value {
    json!({ "sentiment": "positive", "emotions": { "joy": 0.9 } })
}

#[tokio::test]
async fn analyze_returns_result_with_global_line_numbers() {
    let (gateway, app) = app(ok_overall());
    let lyrics = (1..=22)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\n");

    let response = app
        .oneshot(post(json!({ "lyrics": lyrics }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["overall"]["sentiment"], "positive");
    assert_eq!(body["overall"]["keywords"], json!([]));
    assert_eq!(body["per_line"].as_array().unwrap().len(), 22);
    assert_eq!(body["per_line"][21]["lineNo"], 22);
    assert_eq!(body["per_line"][21]["text"], "line 22");
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn missing_or_non_string_lyrics_is_bad_request() {
    for body in [
        json!({}).to_string(),
        json!({ "lyrics": 7 }).to_string(),
        json!({ "lyrics": "" }).to_string(),
        "not json".to_string(),
    ] {
        let (gateway, app) = app(ok_overall());
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "lyrics required" }));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn invalid_summary_is_internal_error_without_partial_result() {
    let (_gateway, app) = app(json!({ "sentiment": "positive", "emotions": {}, "toxicity": 1.5 }));

    let response = app
        .oneshot(post(json!({ "lyrics": "one\ntwo" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body.get("per_line").is_none());
    assert!(body["error"].as_str().unwrap().contains("toxicity"));
}
