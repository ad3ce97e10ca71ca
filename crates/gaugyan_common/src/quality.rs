//! Quality bands used to colour an ATC score.

use serde::{Deserialize, Serialize};

/// Lower bound of the medium band
pub const MEDIUM_THRESHOLD: f64 = 60.0;

/// Lower bound of the good band
pub const GOOD_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityBand {
    Poor,
    Medium,
    Good,
}

impl QualityBand {
    /// Below 60 is poor, 60 up to 80 is medium, 80 and above is good
    pub fn from_score(score: f64) -> Self {
        if score >= GOOD_THRESHOLD {
            QualityBand::Good
        } else if score >= MEDIUM_THRESHOLD {
            QualityBand::Medium
        } else {
            QualityBand::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityBand::Poor => "poor",
            QualityBand::Medium => "medium",
            QualityBand::Good => "good",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(QualityBand::from_score(0.0), QualityBand::Poor);
        assert_eq!(QualityBand::from_score(59.99), QualityBand::Poor);
        assert_eq!(QualityBand::from_score(60.0), QualityBand::Medium);
        assert_eq!(QualityBand::from_score(79.9), QualityBand::Medium);
        assert_eq!(QualityBand::from_score(80.0), QualityBand::Good);
        assert_eq!(QualityBand::from_score(140.0), QualityBand::Good);
    }

    #[test]
    fn test_negative_scores_are_poor() {
        assert_eq!(QualityBand::from_score(-5.0), QualityBand::Poor);
    }
}
