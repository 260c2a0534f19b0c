//! Result schema for lyric analysis and its two validation modes.
//!
//! Model replies cross into typed values here. Per-batch replies are
//! validated leniently: a bad batch is reported as a [`BatchValidation`]
//! value so the caller can drop it and move on. The aggregate summary and the
//! composed [`AnalysisResult`] are validated strictly and fail with
//! [`SchemaError`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Emotion keys the prompts ask the model for. Validation accepts any key.
pub const EMOTION_KEYS: [&str; 6] = ["joy", "anger", "sadness", "fear", "surprise", "disgust"];

/// Emotion name to intensity in `[0, 1]`.
pub type Emotions = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// One annotated lyric line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineResult {
    #[serde(rename = "lineNo")]
    pub line_no: u32,
    pub text: String,
    pub sentiment: Sentiment,
    pub emotions: Emotions,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub keyword: String,
    pub score: f64,
}

/// Aggregate over all lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallResult {
    pub sentiment: Sentiment,
    pub emotions: Emotions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toxicity: Option<f64>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub overall: OverallResult,
    pub per_line: Vec<LineResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("'{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("invalid {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} out of range [0,1]: {value}")]
    OutOfRange { field: String, value: f64 },
    #[error("lineNo must be a positive integer, got {0}")]
    InvalidLineNo(f64),
    #[error("lineNo {line_no} outside batch of {batch_len} lines")]
    LineNoOutsideBatch { line_no: u32, batch_len: usize },
    #[error("lineNo {current} does not follow {previous}")]
    LineOrder { previous: u32, current: u32 },
    #[error("line {0} has empty text")]
    EmptyText(u32),
}

/// Outcome of lenient per-batch validation.
#[derive(Debug)]
pub enum BatchValidation {
    /// Every item passed; lines carry batch-local `lineNo` values.
    Valid(Vec<LineResult>),
    /// The batch must be dropped as a whole.
    Invalid(SchemaError),
}

// =============================================================================
// Decoding
// =============================================================================

/// Wire shape of a line item; `lineNo` arrives as an arbitrary JSON number.
#[derive(Deserialize)]
struct RawLineResult {
    #[serde(rename = "lineNo")]
    line_no: f64,
    text: String,
    sentiment: Sentiment,
    emotions: Emotions,
    intensity: f64,
}

impl TryFrom<RawLineResult> for LineResult {
    type Error = SchemaError;

    fn try_from(raw: RawLineResult) -> Result<Self, Self::Error> {
        let n = raw.line_no;
        if n.fract() != 0.0 || n < 1.0 || n > f64::from(u32::MAX) {
            return Err(SchemaError::InvalidLineNo(n));
        }
        Ok(Self {
            line_no: n as u32,
            text: raw.text,
            sentiment: raw.sentiment,
            emotions: raw.emotions,
            intensity: raw.intensity,
        })
    }
}

fn decode_line(item: &Value) -> Result<LineResult, SchemaError> {
    if !item.is_object() {
        return Err(SchemaError::WrongType {
            field: "per_line[]",
            expected: "an object",
        });
    }
    let raw = RawLineResult::deserialize(item).map_err(|source| SchemaError::Decode {
        what: "line result",
        source,
    })?;
    let line = LineResult::try_from(raw)?;
    line.check_ranges()?;
    Ok(line)
}

// =============================================================================
// Range checks
// =============================================================================

fn check_unit(field: impl Into<String>, value: f64) -> Result<(), SchemaError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SchemaError::OutOfRange {
            field: field.into(),
            value,
        })
    }
}

fn check_emotions(scope: &str, emotions: &Emotions) -> Result<(), SchemaError> {
    for (name, value) in emotions {
        check_unit(format!("{scope}.emotions.{name}"), *value)?;
    }
    Ok(())
}

impl LineResult {
    fn check_ranges(&self) -> Result<(), SchemaError> {
        let scope = format!("line {}", self.line_no);
        check_emotions(&scope, &self.emotions)?;
        check_unit(format!("{scope}.intensity"), self.intensity)
    }
}

impl OverallResult {
    fn check_ranges(&self) -> Result<(), SchemaError> {
        check_emotions("overall", &self.emotions)?;
        if let Some(toxicity) = self.toxicity {
            check_unit("overall.toxicity", toxicity)?;
        }
        Ok(())
    }
}

// =============================================================================
// Validation modes
// =============================================================================

/// Validate a decoded per-batch reply of the form `{"per_line": [...]}`.
///
/// Local `lineNo` values must lie in `1..=batch_len` and strictly increase.
/// Never fails; rejection is reported as [`BatchValidation::Invalid`].
pub fn validate_batch(reply: &Value, batch_len: usize) -> BatchValidation {
    match decode_batch(reply, batch_len) {
        Ok(lines) => BatchValidation::Valid(lines),
        Err(err) => BatchValidation::Invalid(err),
    }
}

fn decode_batch(reply: &Value, batch_len: usize) -> Result<Vec<LineResult>, SchemaError> {
    let items = reply
        .get("per_line")
        .ok_or(SchemaError::MissingField("per_line"))?
        .as_array()
        .ok_or(SchemaError::WrongType {
            field: "per_line",
            expected: "an array",
        })?;

    let mut lines = Vec::with_capacity(items.len());
    let mut previous = 0u32;
    for item in items {
        let line = decode_line(item)?;
        if line.line_no as usize > batch_len {
            return Err(SchemaError::LineNoOutsideBatch {
                line_no: line.line_no,
                batch_len,
            });
        }
        if line.line_no <= previous {
            return Err(SchemaError::LineOrder {
                previous,
                current: line.line_no,
            });
        }
        previous = line.line_no;
        lines.push(line);
    }
    Ok(lines)
}

/// Extract and strictly validate `overall` from a decoded summary reply.
pub fn validate_overall(reply: &Value) -> Result<OverallResult, SchemaError> {
    let value = reply
        .get("overall")
        .ok_or(SchemaError::MissingField("overall"))?;
    if !value.is_object() {
        return Err(SchemaError::WrongType {
            field: "overall",
            expected: "an object",
        });
    }
    let overall = OverallResult::deserialize(value).map_err(|source| SchemaError::Decode {
        what: "overall",
        source,
    })?;
    overall.check_ranges()?;
    Ok(overall)
}

/// Strict check of a composed result: ranges, non-empty text, and strictly
/// increasing unique line numbers.
pub fn validate_analysis(result: &AnalysisResult) -> Result<(), SchemaError> {
    result.overall.check_ranges()?;
    let mut previous = 0u32;
    for line in &result.per_line {
        if line.line_no == 0 {
            return Err(SchemaError::InvalidLineNo(0.0));
        }
        if line.line_no <= previous {
            return Err(SchemaError::LineOrder {
                previous,
                current: line.line_no,
            });
        }
        if line.text.trim().is_empty() {
            return Err(SchemaError::EmptyText(line.line_no));
        }
        line.check_ranges()?;
        previous = line.line_no;
    }
    Ok(())
}
