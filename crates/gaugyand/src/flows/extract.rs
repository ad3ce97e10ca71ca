//! Trait extraction: photo in, five measured traits out.

use super::{as_object, finite_number, model_failure, non_empty_text, ValidationError};
use crate::model::{Flow, ModelRequest, VisionModel};
use crate::prompts;
use gaugyan_common::{GauError, ImagePayload, TraitSet};
use serde_json::Value;
use tracing::debug;

/// Check a raw model response against the TraitSet contract
pub fn validate_traits(raw: &Value) -> Result<TraitSet, ValidationError> {
    let obj = as_object(raw)?;
    Ok(TraitSet {
        body_length: finite_number(obj, "bodyLength")?,
        chest_width: finite_number(obj, "chestWidth")?,
        height_at_withers: finite_number(obj, "heightAtWithers")?,
        rump_angle: finite_number(obj, "rumpAngle")?,
        udder_shape: non_empty_text(obj, "udderShape")?,
    })
}

pub async fn extract_traits(model: &dyn VisionModel, image: &ImagePayload) -> Result<TraitSet, GauError> {
    let flow = Flow::ExtractTraits;
    let request = ModelRequest {
        flow,
        prompt: prompts::trait_extraction_prompt(),
        image: Some(image.clone()),
        output_schema: prompts::trait_schema(),
    };

    let raw = model
        .invoke(&request)
        .await
        .map_err(|e| model_failure(flow.as_str(), e))?;
    let traits = validate_traits(&raw)?;

    debug!(
        "Extracted traits: length={} chest={} withers={} rump={}",
        traits.body_length, traits.chest_width, traits.height_at_withers, traits.rump_angle
    );
    Ok(traits)
}
