//! Survival analysis: time to default rather than whether it happens.
//!
//! Cox proportional hazards, Kaplan-Meier and a random survival forest are
//! trained together on the ratio dataset. Firms without a recorded time to
//! default get a synthesized one (see [`prepare`]).

pub mod cox;
pub mod curve;
pub mod hazard;
pub mod kaplan_meier;
pub mod prepare;
pub mod rsf;
pub mod system;

pub use cox::{CoxCoefficient, CoxModel, CoxParams};
pub use curve::{CurvePoint, SurvivalCurve, SurvivalModelKind, SurvivalResult, SurvivalRiskTier};
pub use hazard::{hazard_ratio_report, interpret_hazard_ratio, HazardRatioEntry};
pub use kaplan_meier::KaplanMeier;
pub use prepare::{prepare_survival_data, PreparedSurvivalData, SurvivalRecord};
pub use rsf::{RandomSurvivalForest, RsfParams};
pub use system::{EntityComparison, SurvivalArtifact, SurvivalParams, SurvivalTrainingSummary};
