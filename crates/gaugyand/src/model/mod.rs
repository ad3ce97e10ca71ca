//! Hosted vision model abstraction.
//!
//! The daemon treats the model as an unreliable oracle:
//! `invoke(prompt, image, schema) -> JSON | error`. Callers validate the
//! returned JSON before it flows any further.

pub mod fake;
pub mod gemini;

use async_trait::async_trait;
use gaugyan_common::ImagePayload;
use serde_json::Value;

pub use fake::FakeVisionModel;
pub use gemini::GeminiClient;

/// Which flow issued a model call (used for logging and metrics labels)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    ExtractTraits,
    GenerateScore,
    RelevantTraits,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::ExtractTraits => "extract_traits",
            Flow::GenerateScore => "generate_score",
            Flow::RelevantTraits => "relevant_traits",
        }
    }
}

/// One structured model invocation
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub flow: Flow,
    pub prompt: String,
    pub image: Option<ImagePayload>,
    pub output_schema: Value,
}

/// Model errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("model is not configured: {0}")]
    NotConfigured(String),
}

impl ModelError {
    /// True when the model answered but its output is unusable, as opposed
    /// to the call itself failing
    pub fn is_bad_output(&self) -> bool {
        matches!(self, ModelError::EmptyResponse | ModelError::InvalidJson(_))
    }
}

#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn invoke(&self, request: &ModelRequest) -> Result<Value, ModelError>;
}

/// Parse model text as JSON, recovering an object or array wrapped in prose
/// or markdown fences
pub fn parse_model_json(text: &str) -> Result<Value, ModelError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ModelError::EmptyResponse);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let sliced = extract_json(trimmed);
    serde_json::from_str::<Value>(sliced)
        .map_err(|e| ModelError::InvalidJson(format!("model output is not valid JSON: {}", e)))
}

/// Slice the outermost `{...}` (or `[...]`) out of text
fn extract_json(text: &str) -> &str {
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                return &text[start..=end];
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json() {
        let value = parse_model_json(r#"{"atcScore": 80}"#).unwrap();
        assert_eq!(value, json!({"atcScore": 80}));
    }

    #[test]
    fn test_parse_json_in_fences() {
        let text = "Here you go:\n```json\n{\"atcScore\": 71.5, \"salientTraits\": \"x\"}\n```";
        let value = parse_model_json(text).unwrap();
        assert_eq!(value["atcScore"], 71.5);
    }

    #[test]
    fn test_parse_array() {
        let value = parse_model_json("result: [\"a\", \"b\"]").unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        assert!(matches!(parse_model_json("  "), Err(ModelError::EmptyResponse)));
        assert!(matches!(
            parse_model_json("I cannot see a cow"),
            Err(ModelError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_bad_output_classification() {
        assert!(ModelError::EmptyResponse.is_bad_output());
        assert!(ModelError::InvalidJson("x".into()).is_bad_output());
        assert!(!ModelError::Timeout(30).is_bad_output());
        assert!(!ModelError::Status { status: 503, body: String::new() }.is_bad_output());
    }
}
