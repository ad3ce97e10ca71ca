//! ATC score generation from measured traits plus the photo.

use super::{as_object, finite_number, model_failure, non_empty_text, ValidationError};
use crate::model::{Flow, ModelRequest, VisionModel};
use crate::prompts;
use gaugyan_common::{GauError, ImagePayload, ScoreResult, TraitSet};
use serde_json::Value;
use tracing::debug;

/// Check a raw model response against the ScoreResult contract. The score
/// range is not constrained.
pub fn validate_score(raw: &Value) -> Result<ScoreResult, ValidationError> {
    let obj = as_object(raw)?;
    Ok(ScoreResult {
        atc_score: finite_number(obj, "atcScore")?,
        salient_traits: non_empty_text(obj, "salientTraits")?,
    })
}

pub async fn generate_score(
    model: &dyn VisionModel,
    traits: &TraitSet,
    image: &ImagePayload,
) -> Result<ScoreResult, GauError> {
    let flow = Flow::GenerateScore;
    let request = ModelRequest {
        flow,
        prompt: prompts::score_prompt(traits),
        image: Some(image.clone()),
        output_schema: prompts::score_schema(),
    };

    let raw = model
        .invoke(&request)
        .await
        .map_err(|e| model_failure(flow.as_str(), e))?;
    let score = validate_score(&raw)?;

    debug!("Generated ATC score {}", score.atc_score);
    Ok(score)
}
