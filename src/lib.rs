#![forbid(unsafe_code)]

//! # lyrics-sentiment
//!
//! Per-line sentiment and emotion analysis of song lyrics with an LLM.
//!
//! Lyrics are split into batches of lines, each batch is annotated by one
//! JSON-mode chat completion, and a final call summarizes the accepted lines.
//! Batch replies that fail validation are dropped without failing the run;
//! the summary is validated strictly. See [`analysis`] for the pipeline.

pub mod analysis;
pub mod config;
pub mod gateway;
pub mod prompts;
pub mod retry;
pub mod schema;
pub mod server;
pub mod text_chunking;

pub use analysis::{AnalysisError, FailureClass, LyricsAnalyzer};
pub use config::AnalyzerConfig;
pub use gateway::{ChatGateway, ProviderGateway, TracingUsageSink, UsageSink};
pub use retry::{with_retry, RetryPolicy};
pub use schema::{AnalysisResult, LineResult, OverallResult, Sentiment};
pub use text_chunking::split_lines;
