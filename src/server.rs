//! HTTP surface: `POST /api/analyze`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::analysis::{AnalysisError, LyricsAnalyzer};

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<LyricsAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: Arc<LyricsAnalyzer>) -> Self {
        Self { analyzer }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, build_router(state)).await
}

async fn analyze(State(state): State<AppState>, body: Bytes) -> Response {
    // Malformed bodies count as missing lyrics.
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    match state.analyzer.analyze_json(&body).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &AnalysisError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "analysis failed");
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
