//! Request and reply types for one chat-completions call.

use serde::Serialize;
use uuid::Uuid;

/// Which analysis run and stage issued a call; copied into usage records.
#[derive(Debug, Clone, Copy)]
pub struct Attribution {
    pub run_id: Option<Uuid>,
    /// Stage label, e.g. "analysis::line_batch".
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self {
            run_id: None,
            caller,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A chat message, serialized as-is into the request body.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model id, e.g. "gpt-4o-mini".
    pub model: String,
    pub messages: Vec<Message>,
    /// Ask the endpoint for a JSON-object-only reply.
    pub json_mode: bool,
    pub attribution: Attribution,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, attribution: Attribution) -> Self {
        Self {
            model: model.into(),
            messages,
            json_mode: false,
            attribution,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Prompt size in characters (not bytes) across all messages.
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

/// Reply text plus token usage; usage is zero when the endpoint omits it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ChatResponse {
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}
