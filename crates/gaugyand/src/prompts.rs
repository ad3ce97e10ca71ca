//! Prompt text and output schemas for the model flows.
//!
//! Schemas use the Gemini `responseSchema` dialect (upper-case type names).

use gaugyan_common::TraitSet;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const TRAIT_EXTRACTION_PROMPT: &str = r#"You are an expert in animal husbandry with a deep understanding of cattle and buffalo anatomy and trait measurement.

Use the attached photo to identify and measure the key body parameters of the animal:
- Body Length (cm)
- Chest Width (cm)
- Height at Withers (cm)
- Rump Angle (degrees)
- Udder Shape

Make the measurements as accurate as possible. Report lengths in cm and the rump angle in degrees. Describe the udder shape as a short phrase (e.g. "bowl shaped", "pendulous").

Respond with a single JSON object with the keys bodyLength, chestWidth, heightAtWithers, rumpAngle and udderShape."#;

const SCORE_PROMPT_HEADER: &str = "You are an assistant specialised in evaluating animal body structure for dairy farming, working for the Rashtriya Gokul Mission. Given the following measurements and characteristics of a cattle or buffalo, and the attached photo, generate an ATC (Animal Type Classification) score and describe the salient traits.";

const SCORE_PROMPT_FOOTER: &str = "Provide an overall ATC score and a brief explanation of which traits most influenced it, and why those traits matter most for this animal's score.

Respond with a single JSON object with the keys atcScore (number) and salientTraits (string).";

const RELEVANCE_PROMPT_HEADER: &str = "You are an expert in dairy farming and animal classification. Given the following information about an animal, identify the traits that most influence its ATC score.";

const RELEVANCE_PROMPT_FOOTER: &str = r#"Consider which traits have the largest impact on the overall score and give a brief explanation for each.

Respond with a JSON object {"relevantTraits": [...]} where each entry is a string naming the trait followed by its explanation, for example:
["Body Length: This trait is important because...", "Chest Width: This trait contributes to..."]"#;

/// Prompt for the trait extractor; the photo is attached separately
pub fn trait_extraction_prompt() -> String {
    TRAIT_EXTRACTION_PROMPT.to_string()
}

/// Prompt for the score generator with the measurements embedded
pub fn score_prompt(traits: &TraitSet) -> String {
    format!(
        "{header}\n\n\
         Body Length: {bl} cm\n\
         Chest Width: {cw} cm\n\
         Height at Withers: {hw} cm\n\
         Rump Angle: {ra} degrees\n\
         Udder Shape: {us}\n\
         Animal Image: (attached)\n\n\
         {footer}",
        header = SCORE_PROMPT_HEADER,
        bl = traits.body_length,
        cw = traits.chest_width,
        hw = traits.height_at_withers,
        ra = traits.rump_angle,
        us = traits.udder_shape,
        footer = SCORE_PROMPT_FOOTER,
    )
}

pub fn relevance_prompt(animal_type: &str, atc_score: f64, trait_data: &BTreeMap<String, f64>) -> String {
    let traits = trait_data
        .iter()
        .map(|(name, value)| format!("  {}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nAnimal Type: {}\nATC Score: {}\nTrait Data:\n{}\n\n{}",
        RELEVANCE_PROMPT_HEADER, animal_type, atc_score, traits, RELEVANCE_PROMPT_FOOTER
    )
}

pub fn trait_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "bodyLength": { "type": "NUMBER", "description": "Body length of the animal in cm" },
            "chestWidth": { "type": "NUMBER", "description": "Chest width of the animal in cm" },
            "heightAtWithers": { "type": "NUMBER", "description": "Height at withers of the animal in cm" },
            "rumpAngle": { "type": "NUMBER", "description": "Rump angle of the animal in degrees" },
            "udderShape": { "type": "STRING", "description": "Shape of the udder" }
        },
        "required": ["bodyLength", "chestWidth", "heightAtWithers", "rumpAngle", "udderShape"]
    })
}

pub fn score_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "atcScore": { "type": "NUMBER", "description": "Overall ATC score for the animal" },
            "salientTraits": { "type": "STRING", "description": "The traits most salient to the ATC score" }
        },
        "required": ["atcScore", "salientTraits"]
    })
}

pub fn relevance_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "relevantTraits": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Most relevant traits influencing the ATC score, with explanations"
            }
        },
        "required": ["relevantTraits"]
    })
}
