//! Relevant-traits advisor: which traits drive a given ATC score.

use super::{model_failure, ValidationError};
use crate::model::{Flow, ModelRequest, VisionModel};
use crate::prompts;
use gaugyan_common::protocol::RelevantTraitsRequest;
use gaugyan_common::GauError;
use serde_json::Value;
use tracing::debug;

const FIELD: &str = "relevantTraits";

/// Reject requests the model should never see
pub fn validate_request(request: &RelevantTraitsRequest) -> Result<(), GauError> {
    if request.animal_type.trim().is_empty() {
        return Err(GauError::InvalidInput("animalType must not be empty".to_string()));
    }
    if !request.atc_score.is_finite() {
        return Err(GauError::InvalidInput("atcScore must be a finite number".to_string()));
    }
    if request.trait_data.is_empty() {
        return Err(GauError::InvalidInput("traitData must not be empty".to_string()));
    }
    if let Some((name, _)) = request.trait_data.iter().find(|(_, v)| !v.is_finite()) {
        return Err(GauError::InvalidInput(format!("trait '{}' is not a finite number", name)));
    }
    Ok(())
}

/// Accepts `{"relevantTraits": [...]}` or a bare array of strings
pub fn validate_relevant_traits(raw: &Value) -> Result<Vec<String>, ValidationError> {
    let list = match raw {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get(FIELD) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Err(ValidationError::MissingField(FIELD)),
            Some(_) => return Err(ValidationError::NotAnArray(FIELD)),
        },
        _ => return Err(ValidationError::NotAnObject),
    };

    let mut traits = Vec::with_capacity(list.len());
    for item in list {
        let text = item.as_str().ok_or(ValidationError::NotAString(FIELD))?.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty(FIELD));
        }
        traits.push(text.to_string());
    }

    if traits.is_empty() {
        return Err(ValidationError::Empty(FIELD));
    }
    Ok(traits)
}

pub async fn suggest_relevant_traits(
    model: &dyn VisionModel,
    request: &RelevantTraitsRequest,
) -> Result<Vec<String>, GauError> {
    validate_request(request)?;

    let flow = Flow::RelevantTraits;
    let model_request = ModelRequest {
        flow,
        prompt: prompts::relevance_prompt(
            request.animal_type.trim(),
            request.atc_score,
            &request.trait_data,
        ),
        image: None,
        output_schema: prompts::relevance_schema(),
    };

    let raw = model
        .invoke(&model_request)
        .await
        .map_err(|e| model_failure(flow.as_str(), e))?;
    let traits = validate_relevant_traits(&raw)?;

    debug!("Model named {} relevant traits", traits.len());
    Ok(traits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FakeVisionModel;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn request() -> RelevantTraitsRequest {
        RelevantTraitsRequest {
            animal_type: "Gir cow".to_string(),
            atc_score: 74.0,
            trait_data: BTreeMap::from([
                ("bodyLength".to_string(), 150.0),
                ("rumpAngle".to_string(), 11.0),
            ]),
        }
    }

    #[test]
    fn test_validate_request() {
        assert!(validate_request(&request()).is_ok());

        let mut bad = request();
        bad.animal_type = " ".to_string();
        assert!(matches!(validate_request(&bad), Err(GauError::InvalidInput(_))));

        let mut bad = request();
        bad.trait_data.clear();
        assert!(matches!(validate_request(&bad), Err(GauError::InvalidInput(_))));

        let mut bad = request();
        bad.trait_data.insert("chestWidth".to_string(), f64::NAN);
        assert!(matches!(validate_request(&bad), Err(GauError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_output_shapes() {
        let wrapped = json!({"relevantTraits": ["Body Length: long frame", " Rump Angle: level "]});
        assert_eq!(
            validate_relevant_traits(&wrapped).unwrap(),
            vec!["Body Length: long frame", "Rump Angle: level"]
        );
        assert_eq!(validate_relevant_traits(&json!(["a"])).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_validate_output_rejects() {
        assert_eq!(
            validate_relevant_traits(&json!({"relevantTraits": []})),
            Err(ValidationError::Empty(FIELD))
        );
        assert_eq!(
            validate_relevant_traits(&json!({"relevantTraits": ["ok", ""]})),
            Err(ValidationError::Empty(FIELD))
        );
        assert_eq!(
            validate_relevant_traits(&json!({"relevantTraits": [3]})),
            Err(ValidationError::NotAString(FIELD))
        );
        assert_eq!(
            validate_relevant_traits(&json!({"relevantTraits": "a, b"})),
            Err(ValidationError::NotAnArray(FIELD))
        );
        assert_eq!(validate_relevant_traits(&json!({})), Err(ValidationError::MissingField(FIELD)));
        assert_eq!(validate_relevant_traits(&json!("a")), Err(ValidationError::NotAnObject));
    }

    #[tokio::test]
    async fn test_invalid_request_skips_model() {
        let model = FakeVisionModel::always_valid(json!(["a"]));
        let mut bad = request();
        bad.trait_data.clear();

        assert!(suggest_relevant_traits(&model, &bad).await.is_err());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_suggest_without_image() {
        let model = FakeVisionModel::always_valid(json!({"relevantTraits": ["Body Length: matters"]}));
        let traits = suggest_relevant_traits(&model, &request()).await.unwrap();
        assert_eq!(traits, vec!["Body Length: matters"]);
        assert_eq!(model.calls(), vec![Flow::RelevantTraits]);
    }
}
