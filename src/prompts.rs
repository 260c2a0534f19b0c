//! Prompt templates for per-line and summary analysis.
//!
//! `LINE_ANALYSIS_PROMPT` numbers one batch of lyric lines from 1 and asks for
//! a `per_line` array. `SUMMARY_PROMPT` hands over the accepted per-line
//! results as JSON, cut to the context budget, and asks for `overall`.

use crate::gateway::Message;
use crate::schema::{LineResult, EMOTION_KEYS};

/// Character budget for serialized per-line results in the summary prompt.
pub const DEFAULT_CONTEXT_BUDGET: usize = 60_000;

/// Rendered prompt ready for the model.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// A prompt template with `{schema}` and `{input}` placeholders in `user`.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    fn render(&self, schema: &str, input: &str) -> PromptInstance {
        let user = self
            .user
            .replace("{schema}", schema)
            .replace("{input}", input);

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: self.system.trim().to_string(),
            user: user.trim().to_string(),
        }
    }
}

pub const LINE_ANALYSIS_PROMPT: PromptTemplate = PromptTemplate {
    slug: "line_analysis_v1",
    system: "You are a song lyrics sentiment analyzer. Reply ONLY with JSON.",
    user: r#"
For each numbered line, return JSON in exactly this schema:
{schema}

Lines:
{input}
"#,
};

pub const SUMMARY_PROMPT: PromptTemplate = PromptTemplate {
    slug: "overall_summary_v1",
    system: "Summarize song lyrics sentiment. Reply ONLY with JSON.",
    user: r#"
Combine the per-line results below into an overall assessment, returning JSON in exactly this schema:
{schema}

Per-line results (JSON): {input}
"#,
};

fn emotions_schema() -> String {
    let fields: Vec<String> = EMOTION_KEYS
        .iter()
        .map(|key| format!(r#""{key}":0~1"#))
        .collect();
    format!("{{{}}}", fields.join(","))
}

/// Render the per-batch prompt, numbering lines from 1 within the batch.
pub fn render_line_prompt(lines: &[String]) -> PromptInstance {
    let schema = format!(
        r#"{{"per_line":[{{"lineNo":1,"text":"...","sentiment":"positive|neutral|negative","emotions":{},"intensity":0~1}}]}}"#,
        emotions_schema()
    );
    let enumerated = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n");

    LINE_ANALYSIS_PROMPT.render(&schema, &enumerated)
}

/// Render the summary prompt from accumulated per-line results.
///
/// The serialized results are cut to at most `budget` characters.
pub fn render_summary_prompt(
    per_line: &[LineResult],
    budget: usize,
) -> Result<PromptInstance, serde_json::Error> {
    let schema = format!(
        r#"{{"overall":{{"sentiment":"positive|neutral|negative","emotions":{},"toxicity":0~1,"keywords":[{{"keyword":"","score":0~1}}]}}}}"#,
        emotions_schema()
    );
    let serialized = serde_json::to_string(per_line)?;

    Ok(SUMMARY_PROMPT.render(&schema, truncate_chars(&serialized, budget)))
}

/// Longest prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
