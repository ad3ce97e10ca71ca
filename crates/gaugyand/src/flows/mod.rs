//! Model flows: one prompt, one model call, one validated result.
//!
//! Validation is a pure function of the raw model JSON so every contract
//! can be tested without a live model.

pub mod extract;
pub mod relevance;
pub mod score;

use crate::model::ModelError;
use gaugyan_common::GauError;
use serde_json::{Map, Value};
use tracing::warn;

pub use extract::{extract_traits, validate_traits};
pub use relevance::{suggest_relevant_traits, validate_relevant_traits};
pub use score::{generate_score, validate_score};

/// Why a model response failed its schema
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' is not a number")]
    NotANumber(&'static str),

    #[error("field '{0}' is not finite")]
    NotFinite(&'static str),

    #[error("field '{0}' is not a string")]
    NotAString(&'static str),

    #[error("field '{0}' is empty")]
    Empty(&'static str),

    #[error("field '{0}' is not an array")]
    NotAnArray(&'static str),
}

impl From<ValidationError> for GauError {
    fn from(err: ValidationError) -> Self {
        GauError::ModelResponseInvalid(err.to_string())
    }
}

/// Map a failed model call to the caller-visible error
pub fn model_failure(flow: &str, err: ModelError) -> GauError {
    warn!("Model call for {} failed: {}", flow, err);
    if err.is_bad_output() {
        GauError::ModelResponseInvalid(err.to_string())
    } else {
        GauError::UpstreamFailure(format!("model call failed: {}", err))
    }
}

fn as_object(raw: &Value) -> Result<&Map<String, Value>, ValidationError> {
    raw.as_object().ok_or(ValidationError::NotAnObject)
}

fn finite_number(obj: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    let value = obj.get(field).ok_or(ValidationError::MissingField(field))?;
    if value.is_null() {
        return Err(ValidationError::MissingField(field));
    }
    let number = value.as_f64().ok_or(ValidationError::NotANumber(field))?;
    if !number.is_finite() {
        return Err(ValidationError::NotFinite(field));
    }
    Ok(number)
}

/// Non-empty string, returned trimmed
fn non_empty_text(obj: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    let value = obj.get(field).ok_or(ValidationError::MissingField(field))?;
    if value.is_null() {
        return Err(ValidationError::MissingField(field));
    }
    let text = value.as_str().ok_or(ValidationError::NotAString(field))?.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(text.to_string())
}
