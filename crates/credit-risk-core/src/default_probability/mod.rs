pub mod ensemble;
pub mod tiers;

pub use ensemble::{
    DefaultLabel, EnsembleArtifact, EnsembleParams, ModelInfo, PredictionResult, StackingEnsemble,
};
pub use tiers::{PdRiskAssessment, PdRiskTier};
