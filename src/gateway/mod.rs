//! Model gateway for OpenAI-compatible chat completions.

pub mod error;
pub mod openai;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Instant;

use openai::OpenAiClient;

pub use error::ProviderError;
pub use types::{Attribution, ChatRequest, ChatResponse, Message, Role};
pub use usage::{CallOutcome, CallRecord, NoopUsageSink, TracingUsageSink, UsageSink};

/// Single-attempt chat completion. Retrying is the caller's concern.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Gateway backed by a real endpoint; every attempt is reported to the sink.
pub struct ProviderGateway<U: UsageSink> {
    client: OpenAiClient,
    usage_sink: Arc<U>,
}

impl<U: UsageSink> ProviderGateway<U> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        Ok(Self::new(OpenAiClient::from_env()?, usage_sink))
    }

    pub fn new(client: OpenAiClient, usage_sink: Arc<U>) -> Self {
        Self { client, usage_sink }
    }
}

#[async_trait::async_trait]
impl<U: UsageSink> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();
        let result = self.client.complete(&req).await;
        self.usage_sink
            .record(CallRecord::new(&req, start.elapsed(), &result))
            .await;
        result
    }
}
