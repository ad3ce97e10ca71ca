//! Analysis domain records.
//!
//! All records serialize with camelCase keys so the JSON shape matches what
//! the web client and the model schemas use (`bodyLength`, `atcScore`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a user account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body-structure measurements extracted from one photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitSet {
    /// Body length in cm
    pub body_length: f64,
    /// Chest width in cm
    pub chest_width: f64,
    /// Height at withers in cm
    pub height_at_withers: f64,
    /// Rump angle in degrees
    pub rump_angle: f64,
    /// Free-text udder shape descriptor (e.g. "bowl shaped")
    pub udder_shape: String,
}

impl TraitSet {
    /// Linear measurements in cm, labelled, in display order
    pub fn measurements_cm(&self) -> [(&'static str, f64); 3] {
        [
            ("Body Length", self.body_length),
            ("Chest Width", self.chest_width),
            ("Height at Withers", self.height_at_withers),
        ]
    }
}

/// ATC score and the model's explanation of what drove it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub atc_score: f64,
    pub salient_traits: String,
}

/// Traits and score of one analysis, always produced and returned together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    #[serde(flatten)]
    pub traits: TraitSet,
    #[serde(flatten)]
    pub score: ScoreResult,
}

/// A persisted analysis owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    /// Content reference of the analysed photo, never the payload itself
    pub image: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub result: CombinedResult,
}

impl AnalysisRecord {
    pub fn new(
        id: impl Into<String>,
        image: impl Into<String>,
        timestamp: DateTime<Utc>,
        result: CombinedResult,
    ) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
            timestamp,
            result,
        }
    }
}
