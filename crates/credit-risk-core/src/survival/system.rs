use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CreditRiskError;
use crate::models::dataset::TrainingDataset;
use crate::models::metrics::concordance_index;
use crate::ratios::{RatioCode, RatioVector};
use crate::survival::cox::{CoxModel, CoxParams};
use crate::survival::curve::{CurvePoint, SurvivalModelKind, SurvivalResult, SurvivalRiskTier};
use crate::survival::hazard::{hazard_ratio_report, HazardRatioEntry};
use crate::survival::kaplan_meier::KaplanMeier;
use crate::survival::prepare::prepare_survival_data;
use crate::survival::rsf::{RandomSurvivalForest, RsfParams};
use crate::types::Months;
use crate::CreditRiskResult;

const TOP_HAZARD_RATIOS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalParams {
    /// Seed for synthesizing missing durations.
    pub seed: u64,
    pub min_events: usize,
    pub cox: CoxParams,
    pub rsf: RsfParams,
}

impl Default for SurvivalParams {
    fn default() -> Self {
        Self {
            seed: 42,
            min_events: 5,
            cox: CoxParams::default(),
            rsf: RsfParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalTrainingSummary {
    pub samples: usize,
    pub events: usize,
    pub censored: usize,
    pub synthesized_durations: usize,
    pub c_index: f64,
    pub top_hazard_ratios: Vec<HazardRatioEntry>,
    /// Kaplan-Meier median over the training population.
    pub median_survival_time: Option<Months>,
}

/// One entity's Cox curve, labelled for side-by-side display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityComparison {
    pub name: String,
    pub survival_curve: Vec<CurvePoint>,
    pub median_time: Option<Months>,
    pub risk_tier: SurvivalRiskTier,
}

/// Cox, Kaplan-Meier and random survival forest trained together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalArtifact {
    pub cox: CoxModel,
    pub rsf: RandomSurvivalForest,
    pub kaplan_meier: KaplanMeier,
    pub hazard_ratios: Vec<HazardRatioEntry>,
    pub summary: SurvivalTrainingSummary,
    pub feature_order: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

impl SurvivalArtifact {
    pub fn train(dataset: &TrainingDataset, params: &SurvivalParams) -> CreditRiskResult<Self> {
        let events = dataset.default_count();
        if events < params.min_events {
            return Err(CreditRiskError::InsufficientData(format!(
                "Survival training needs at least {} defaults (got {events})",
                params.min_events
            )));
        }
        if dataset.len() == events {
            return Err(CreditRiskError::InsufficientData(
                "Survival training needs censored (non-defaulted) observations too".into(),
            ));
        }

        let prepared = prepare_survival_data(dataset, params.seed);
        let x = prepared.features();
        let durations = prepared.durations();
        let flags = prepared.events();
        info!(
            samples = prepared.records.len(),
            events,
            synthesized = prepared.synthesized,
            "training survival models"
        );

        let cox = CoxModel::fit(&x, &durations, &flags, &params.cox)?;
        let rsf = RandomSurvivalForest::fit(&x, &durations, &flags, &params.rsf);
        let kaplan_meier = KaplanMeier::fit(&durations, &flags);

        let risks: Vec<f64> = x.iter().map(|row| cox.partial_hazard(row)).collect();
        let c_index = concordance_index(&durations, &flags, &risks);
        let hazard_ratios = hazard_ratio_report(cox.coefficients());

        let summary = SurvivalTrainingSummary {
            samples: prepared.records.len(),
            events,
            censored: prepared.records.len() - events,
            synthesized_durations: prepared.synthesized,
            c_index: (c_index * 10_000.0).round() / 10_000.0,
            top_hazard_ratios: hazard_ratios.iter().take(TOP_HAZARD_RATIOS).cloned().collect(),
            median_survival_time: kaplan_meier.median(),
        };
        info!(c_index = summary.c_index, "survival models trained");

        Ok(Self {
            cox,
            rsf,
            kaplan_meier,
            hazard_ratios,
            summary,
            feature_order: RatioCode::feature_order(),
            trained_at: Utc::now(),
        })
    }

    pub fn check_feature_order(&self) -> CreditRiskResult<()> {
        if self.feature_order != RatioCode::feature_order() {
            return Err(CreditRiskError::Persistence(format!(
                "Survival artifact feature order {:?} does not match X_1..X_14",
                self.feature_order
            )));
        }
        Ok(())
    }

    pub fn predict(&self, ratios: &RatioVector, model: SurvivalModelKind) -> SurvivalResult {
        let row = ratios.to_features();
        let curve = match model {
            SurvivalModelKind::Cox => self.cox.survival_curve(&row),
            SurvivalModelKind::Rsf => self.rsf.survival_curve(&row),
        };
        SurvivalResult::from_curve(model, &curve)
    }

    pub fn hazard_ratios(&self) -> &[HazardRatioEntry] {
        &self.hazard_ratios
    }

    /// Cox curves for several entities, named `Entity #1`, `Entity #2`, ...
    pub fn compare(&self, entities: &[RatioVector]) -> Vec<EntityComparison> {
        entities
            .iter()
            .enumerate()
            .map(|(i, ratios)| {
                let result = self.predict(ratios, SurvivalModelKind::Cox);
                EntityComparison {
                    name: format!("Entity #{}", i + 1),
                    survival_curve: result.survival_curve,
                    median_time: result.median_time_to_default,
                    risk_tier: result.risk_tier,
                }
            })
            .collect()
    }
}
