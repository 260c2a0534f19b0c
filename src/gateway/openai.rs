//! Client for OpenAI-compatible `/chat/completions` endpoints.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use super::types::{ChatRequest, ChatResponse, Message};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Prompt cap, counted in characters.
const MAX_PROMPT_CHARS: usize = 500_000;

/// Reply body cap, counted in bytes.
const MAX_REPLY_BYTES: usize = 1_024 * 1_024;

/// Non-JSON error bodies are quoted up to this many characters.
const ERROR_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    /// `OPENAI_API_KEY` is required; `OPENAI_BASE_URL` and
    /// `OPENAI_TIMEOUT_SECONDS` are optional.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::config("OPENAI_API_KEY not set"))?;

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let timeout = match std::env::var("OPENAI_TIMEOUT_SECONDS") {
            Ok(raw) => raw.parse().map(Duration::from_secs).map_err(|_| {
                ProviderError::config(format!("OPENAI_TIMEOUT_SECONDS must be seconds, got {raw:?}"))
            })?,
            Err(_) => DEFAULT_TIMEOUT,
        };

        Self::with_config(api_key, base_url, timeout)
    }

    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.into()))
            .map_err(|_| ProviderError::config("API key is not a valid header value"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// One POST to the endpoint. The reply text is returned untouched.
    pub async fn complete(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let prompt_chars = req.prompt_chars();
        if prompt_chars > MAX_PROMPT_CHARS {
            return Err(ProviderError::TooLarge {
                what: "prompt",
                len: prompt_chars,
                max: MAX_PROMPT_CHARS,
            });
        }

        let body = CompletionBody {
            model: &req.model,
            messages: &req.messages,
            response_format: req.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let mut response = self.http.post(self.chat_url()).json(&body).send().await?;

        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let raw = read_capped(&mut response).await?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &raw, request_id));
        }

        serde_json::from_slice::<Completion>(&raw)
            .map_err(|e| ProviderError::Malformed(format!("invalid envelope: {e}")))?
            .into_response()
    }
}

async fn read_capped(response: &mut reqwest::Response) -> Result<Vec<u8>, ProviderError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let len = bytes.len() + chunk.len();
        if len > MAX_REPLY_BYTES {
            return Err(ProviderError::TooLarge {
                what: "reply",
                len,
                max: MAX_REPLY_BYTES,
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn status_error(status: u16, raw: &[u8], request_id: Option<String>) -> ProviderError {
    let detail = serde_json::from_slice::<Completion>(raw)
        .ok()
        .and_then(|c| c.error);

    let (message, provider_code) = match detail {
        Some(ApiError { message, code }) => (message.unwrap_or_default(), code),
        None => (
            String::from_utf8_lossy(raw)
                .chars()
                .take(ERROR_SNIPPET_CHARS)
                .collect(),
            None,
        ),
    };

    ProviderError::Status {
        status,
        message,
        provider_code,
        request_id,
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct Completion {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: Option<ToolFunction>,
}

#[derive(Deserialize)]
struct ToolFunction {
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<String>,
}

impl Completion {
    fn into_response(self) -> Result<ChatResponse, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::Malformed(format!(
                "error in reply: {}",
                error.message.unwrap_or_default()
            )));
        }

        let message = self
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .ok_or_else(|| ProviderError::Malformed("no choices in reply".into()))?;

        let content = match message.content {
            Some(content) if !content.trim().is_empty() => content,
            // Some models put JSON-mode output in tool-call arguments.
            _ => message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .filter_map(|tc| tc.function.and_then(|f| f.arguments))
                .find(|args| !args.trim().is_empty())
                .unwrap_or_default(),
        };

        let (input_tokens, output_tokens) = self
            .usage
            .map(|u| {
                (
                    u.prompt_tokens.unwrap_or(0),
                    u.completion_tokens.unwrap_or(0),
                )
            })
            .unwrap_or((0, 0));

        Ok(ChatResponse {
            content,
            input_tokens,
            output_tokens,
        })
    }
}
