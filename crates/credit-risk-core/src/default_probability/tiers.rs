use serde::{Deserialize, Serialize};

use crate::types::Probability;

/// Risk band over the stacked default probability.
///
/// Bands are inclusive at the lower bound and exclusive at the upper bound;
/// the top band is open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PdRiskTier {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl PdRiskTier {
    pub fn from_pd(pd: Probability) -> Self {
        if pd < 0.02 {
            PdRiskTier::VeryLow
        } else if pd < 0.05 {
            PdRiskTier::Low
        } else if pd < 0.10 {
            PdRiskTier::Medium
        } else if pd < 0.20 {
            PdRiskTier::High
        } else {
            PdRiskTier::VeryHigh
        }
    }

    /// Indicative agency rating range for the band.
    pub fn rating_band(self) -> &'static str {
        match self {
            PdRiskTier::VeryLow => "AAA-AA",
            PdRiskTier::Low => "A-BBB",
            PdRiskTier::Medium => "BB",
            PdRiskTier::High => "B",
            PdRiskTier::VeryHigh => "CCC-D",
        }
    }
}

impl std::fmt::Display for PdRiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdRiskTier::VeryLow => write!(f, "Very low"),
            PdRiskTier::Low => write!(f, "Low"),
            PdRiskTier::Medium => write!(f, "Medium"),
            PdRiskTier::High => write!(f, "High"),
            PdRiskTier::VeryHigh => write!(f, "Very high"),
        }
    }
}

/// Tier with its rating band, as reported alongside a prediction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PdRiskAssessment {
    pub tier: PdRiskTier,
    pub rating_band: String,
}

impl From<Probability> for PdRiskAssessment {
    fn from(pd: Probability) -> Self {
        let tier = PdRiskTier::from_pd(pd);
        Self {
            tier,
            rating_band: tier.rating_band().to_string(),
        }
    }
}
