//! Per-call usage records.
//!
//! The gateway hands one `CallRecord` per attempt to a `UsageSink`. The CLI
//! and server log them through `TracingUsageSink`; tests discard them.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::error::ProviderError;
use super::types::{ChatRequest, ChatResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Completed {
        input_tokens: u32,
        output_tokens: u32,
    },
    Failed {
        code: &'static str,
        request_id: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub model: String,
    pub caller: &'static str,
    pub run_id: Option<Uuid>,
    pub latency_ms: u64,
    pub outcome: CallOutcome,
}

impl CallRecord {
    pub fn new(
        req: &ChatRequest,
        latency: Duration,
        result: &Result<ChatResponse, ProviderError>,
    ) -> Self {
        let outcome = match result {
            Ok(resp) => CallOutcome::Completed {
                input_tokens: resp.input_tokens,
                output_tokens: resp.output_tokens,
            },
            Err(err) => CallOutcome::Failed {
                code: err.code(),
                request_id: err.request_id().map(str::to_owned),
            },
        };

        Self {
            model: req.model.clone(),
            caller: req.attribution.caller,
            run_id: req.attribution.run_id,
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            outcome,
        }
    }
}

/// Destination for call records. Recording must never fail the call.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: CallRecord);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: CallRecord) {}
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, record: CallRecord) {
        let run_id = record.run_id.map(|id| id.to_string()).unwrap_or_default();
        match &record.outcome {
            CallOutcome::Completed {
                input_tokens,
                output_tokens,
            } => tracing::info!(
                model = %record.model,
                caller = record.caller,
                run_id = %run_id,
                input_tokens,
                output_tokens,
                latency_ms = record.latency_ms,
                "model call completed"
            ),
            CallOutcome::Failed { code, request_id } => tracing::warn!(
                model = %record.model,
                caller = record.caller,
                run_id = %run_id,
                error_code = *code,
                request_id = request_id.as_deref().unwrap_or(""),
                latency_ms = record.latency_ms,
                "model call failed"
            ),
        }
    }
}
