//! Chunked lyric analysis.
//!
//! 1. **Split**: lyrics become fixed-size batches of trimmed, non-empty lines
//! 2. **Annotate**: one model call per batch, validated leniently; a batch
//!    that fails is skipped and the run continues
//! 3. **Summarize**: one model call over all accepted lines, validated
//!    strictly; any failure here fails the run
//!
//! Batches run sequentially and the summary call always follows the last batch.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::AnalyzerConfig;
use crate::gateway::{Attribution, ChatGateway, ChatRequest, ProviderError};
use crate::prompts::{render_line_prompt, render_summary_prompt, PromptInstance};
use crate::retry::with_retry;
use crate::schema::{
    validate_analysis, validate_batch, validate_overall, AnalysisResult, BatchValidation,
    LineResult, SchemaError,
};
use crate::text_chunking::split_lines;

// =============================================================================
// Errors
// =============================================================================

/// Broad failure class, used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    InvalidInput,
    Remote,
    Validation,
}

/// Fatal analysis failure. No partial result accompanies it.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("lyrics required")]
    InvalidInput,
    #[error("summary request failed: {0}")]
    Remote(#[from] ProviderError),
    #[error("failed to encode per-line results: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid summary: {0}")]
    Summary(#[source] SchemaError),
    #[error("invalid analysis result: {0}")]
    Result(#[source] SchemaError),
}

impl AnalysisError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::InvalidInput => FailureClass::InvalidInput,
            Self::Remote(_) => FailureClass::Remote,
            Self::Encode(_) | Self::Summary(_) | Self::Result(_) => FailureClass::Validation,
        }
    }

    /// HTTP status a transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self.class() {
            FailureClass::InvalidInput => 400,
            FailureClass::Remote | FailureClass::Validation => 500,
        }
    }
}

// =============================================================================
// Batch outcomes
// =============================================================================

/// Why a batch contributed no lines.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    #[error("model call failed: {0}")]
    Remote(#[from] ProviderError),
    #[error("reply rejected: {0}")]
    Invalid(#[from] SchemaError),
}

#[derive(Debug)]
pub enum BatchOutcome {
    /// Lines with global line numbers and source text.
    Accepted {
        chunk_index: usize,
        lines: Vec<LineResult>,
    },
    Skipped {
        chunk_index: usize,
        reason: SkipReason,
    },
}

impl BatchOutcome {
    pub fn chunk_index(&self) -> usize {
        match self {
            Self::Accepted { chunk_index, .. } | Self::Skipped { chunk_index, .. } => *chunk_index,
        }
    }
}

/// Concatenate accepted lines in chunk order.
fn collect_lines(mut outcomes: Vec<BatchOutcome>) -> Vec<LineResult> {
    outcomes.sort_by_key(BatchOutcome::chunk_index);
    outcomes
        .into_iter()
        .flat_map(|outcome| match outcome {
            BatchOutcome::Accepted { lines, .. } => lines,
            BatchOutcome::Skipped { .. } => Vec::new(),
        })
        .collect()
}

// =============================================================================
// Analyzer
// =============================================================================

pub struct LyricsAnalyzer {
    gateway: Arc<dyn ChatGateway>,
    config: AnalyzerConfig,
}

impl LyricsAnalyzer {
    /// A batch size of 0 is treated as 1, for splitting and numbering alike.
    pub fn new(gateway: Arc<dyn ChatGateway>, mut config: AnalyzerConfig) -> Self {
        config.batch_size = config.batch_size.max(1);
        Self { gateway, config }
    }

    /// Analyze a decoded request body of the form `{"lyrics": "..."}`.
    ///
    /// A missing or non-string `lyrics` field is an input error.
    pub async fn analyze_json(&self, body: &Value) -> Result<AnalysisResult, AnalysisError> {
        match body.get("lyrics").and_then(Value::as_str) {
            Some(lyrics) => self.analyze(lyrics).await,
            None => Err(AnalysisError::InvalidInput),
        }
    }

    /// Analyze raw lyric text.
    ///
    /// Makes one model call per batch plus one summary call (absent retries).
    /// Only the empty string is rejected up front; blank-only text yields no
    /// batches but still gets a summary call.
    pub async fn analyze(&self, lyrics: &str) -> Result<AnalysisResult, AnalysisError> {
        if lyrics.is_empty() {
            return Err(AnalysisError::InvalidInput);
        }
        let batches = split_lines(lyrics, self.config.batch_size);

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("analyze", %run_id, batches = batches.len());
        self.run(run_id, batches).instrument(span).await
    }

    async fn run(
        &self,
        run_id: Uuid,
        batches: Vec<Vec<String>>,
    ) -> Result<AnalysisResult, AnalysisError> {
        info!(
            lines = batches.iter().map(Vec::len).sum::<usize>(),
            model = %self.config.model,
            "starting lyric analysis"
        );

        let mut outcomes = Vec::with_capacity(batches.len());
        for (chunk_index, lines) in batches.iter().enumerate() {
            let outcome = self.analyze_batch(run_id, chunk_index, lines).await;
            if let BatchOutcome::Skipped { reason, .. } = &outcome {
                warn!(chunk_index, error = %reason, "skipping batch");
            }
            outcomes.push(outcome);
        }

        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Skipped { .. }))
            .count();
        let per_line = collect_lines(outcomes);

        let prompt = render_summary_prompt(&per_line, self.config.context_budget)?;
        let reply = self
            .call_json(run_id, "analysis::summary", &prompt)
            .await?;
        let overall = validate_overall(&reply).map_err(AnalysisError::Summary)?;

        let result = AnalysisResult { overall, per_line };
        validate_analysis(&result).map_err(AnalysisError::Result)?;

        info!(
            lines = result.per_line.len(),
            skipped_batches = skipped,
            "lyric analysis complete"
        );
        Ok(result)
    }

    async fn analyze_batch(
        &self,
        run_id: Uuid,
        chunk_index: usize,
        lines: &[String],
    ) -> BatchOutcome {
        let prompt = render_line_prompt(lines);
        let reply = match self.call_json(run_id, "analysis::line_batch", &prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                return BatchOutcome::Skipped {
                    chunk_index,
                    reason: err.into(),
                }
            }
        };

        match validate_batch(&reply, lines.len()) {
            BatchValidation::Valid(items) => {
                let offset = chunk_index * self.config.batch_size;
                let accepted = items
                    .into_iter()
                    .map(|mut item| {
                        let local = item.line_no as usize;
                        // validate_batch guarantees 1 <= local <= lines.len()
                        item.text = lines[local - 1].clone();
                        item.line_no = (offset + local) as u32;
                        item
                    })
                    .collect();
                BatchOutcome::Accepted {
                    chunk_index,
                    lines: accepted,
                }
            }
            BatchValidation::Invalid(err) => BatchOutcome::Skipped {
                chunk_index,
                reason: err.into(),
            },
        }
    }

    /// One retried JSON-mode call; an unparseable reply decodes as `{}`.
    async fn call_json(
        &self,
        run_id: Uuid,
        caller: &'static str,
        prompt: &PromptInstance,
    ) -> Result<Value, ProviderError> {
        let req = ChatRequest::new(
            self.config.model.clone(),
            prompt.to_messages(),
            Attribution::new(caller).with_run(run_id),
        )
        .json();

        let resp = with_retry(&self.config.retry, || self.gateway.chat(req.clone())).await?;

        Ok(serde_json::from_str(&resp.content).unwrap_or_else(|err| {
            debug!(caller, error = %err, "reply is not valid JSON; treating as empty object");
            Value::Object(Default::default())
        }))
    }
}
