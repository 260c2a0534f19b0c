//! Analyzer configuration with environment overrides.

use std::time::Duration;

use crate::prompts::DEFAULT_CONTEXT_BUDGET;
use crate::retry::RetryPolicy;
use crate::text_chunking::DEFAULT_BATCH_SIZE;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Model id sent with every request.
    pub model: String,
    /// Lines per batch request.
    pub batch_size: usize,
    /// Character budget for per-line results embedded in the summary prompt.
    pub context_budget: usize,
    pub retry: RetryPolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            context_budget: DEFAULT_CONTEXT_BUDGET,
            retry: RetryPolicy::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Defaults overridden by `LYRICS_MODEL`, `LYRICS_BATCH_SIZE`,
    /// `LYRICS_CONTEXT_BUDGET`, `LYRICS_MAX_RETRIES` and `LYRICS_RETRY_DELAY_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(model) = lookup("LYRICS_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(size) = parse_var::<usize>(&lookup, "LYRICS_BATCH_SIZE", "a positive integer")? {
            if size == 0 {
                return Err(ConfigError::Invalid {
                    var: "LYRICS_BATCH_SIZE",
                    expected: "a positive integer",
                    value: "0".into(),
                });
            }
            config.batch_size = size;
        }
        if let Some(budget) = parse_var(&lookup, "LYRICS_CONTEXT_BUDGET", "an integer")? {
            config.context_budget = budget;
        }
        if let Some(retries) = parse_var(&lookup, "LYRICS_MAX_RETRIES", "an integer")? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = parse_var(&lookup, "LYRICS_RETRY_DELAY_MS", "milliseconds")? {
            config.retry.base_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var,
                expected,
                value: raw,
            }),
    }
}
