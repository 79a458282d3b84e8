use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CreditRiskError;
use crate::models::boosting::{BoostingParams, GradientBoosting};
use crate::models::dataset::{stratified_folds, TrainingDataset};
use crate::models::forest::{ForestParams, RandomForest};
use crate::models::logistic::{LogisticParams, LogisticRegression};
use crate::models::metrics::ClassificationMetrics;
use crate::ratios::{RatioCode, RatioVector, RATIO_COUNT};
use crate::types::Probability;
use crate::CreditRiskResult;

use super::tiers::PdRiskAssessment;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleParams {
    /// Share of observations held out for test metrics.
    pub test_fraction: f64,
    pub seed: u64,
    pub logistic: LogisticParams,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    /// Folds used to produce out-of-fold base predictions for the meta model.
    pub stacking_folds: usize,
    /// Stacked PD at or above this is labelled `likely_default`.
    pub threshold: f64,
    /// Minimum observations per class.
    pub min_class_count: usize,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            logistic: LogisticParams::default(),
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            stacking_folds: 5,
            threshold: 0.5,
            min_class_count: 5,
        }
    }
}

impl EnsembleParams {
    pub fn validate(&self) -> CreditRiskResult<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 0.9) {
            return Err(CreditRiskError::InvalidInput {
                field: "ensemble.test_fraction".into(),
                reason: "Must be in (0, 0.9)".into(),
            });
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(CreditRiskError::InvalidInput {
                field: "ensemble.threshold".into(),
                reason: "Must be in (0, 1)".into(),
            });
        }
        if self.stacking_folds < 2 {
            return Err(CreditRiskError::InvalidInput {
                field: "ensemble.stacking_folds".into(),
                reason: "Need at least 2 folds".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseModels {
    pub logistic: LogisticRegression,
    pub random_forest: RandomForest,
    pub gradient_boosting: GradientBoosting,
}

impl BaseModels {
    fn fit(
        x: &[[f64; RATIO_COUNT]],
        y: &[f64],
        params: &EnsembleParams,
        seed: u64,
    ) -> CreditRiskResult<Self> {
        Ok(Self {
            logistic: LogisticRegression::fit(x, y, &params.logistic)?,
            random_forest: RandomForest::fit(x, y, &params.forest, seed),
            gradient_boosting: GradientBoosting::fit(x, y, &params.boosting, seed),
        })
    }

    fn predict(&self, row: &[f64]) -> [f64; 3] {
        [
            self.logistic.predict_proba(row),
            self.random_forest.predict_proba(row),
            self.gradient_boosting.predict_proba(row),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultLabel {
    LikelyDefault,
    LikelyHealthy,
}

impl std::fmt::Display for DefaultLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultLabel::LikelyDefault => write!(f, "likely_default"),
            DefaultLabel::LikelyHealthy => write!(f, "likely_healthy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub pd_logistic: Probability,
    pub pd_random_forest: Probability,
    pub pd_gradient_boosting: Probability,
    pub pd_stacking: Probability,
    pub label: DefaultLabel,
    pub risk: PdRiskAssessment,
}

/// Logistic regression, random forest and gradient boosting combined by a
/// logistic meta model trained on out-of-fold base probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackingEnsemble {
    base: BaseModels,
    meta: LogisticRegression,
    threshold: f64,
}

impl StackingEnsemble {
    pub fn fit(
        x: &[[f64; RATIO_COUNT]],
        labels: &[bool],
        params: &EnsembleParams,
    ) -> CreditRiskResult<Self> {
        let y: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let folds = stratified_folds(labels, params.stacking_folds, params.seed);

        let mut oof = vec![[0.0; 3]; x.len()];
        for (k, fold) in folds.iter().enumerate() {
            if fold.is_empty() {
                continue;
            }
            let mut in_fold = vec![false; x.len()];
            for &i in fold {
                in_fold[i] = true;
            }
            let train_idx: Vec<usize> = (0..x.len()).filter(|&i| !in_fold[i]).collect();
            let fold_x: Vec<[f64; RATIO_COUNT]> = train_idx.iter().map(|&i| x[i]).collect();
            let fold_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();

            let models = BaseModels::fit(&fold_x, &fold_y, params, params.seed + k as u64 + 1)?;
            for &i in fold {
                oof[i] = models.predict(&x[i]);
            }
            debug!(fold = k, train = train_idx.len(), held_out = fold.len(), "stacking fold fitted");
        }

        let meta = LogisticRegression::fit(&oof, &y, &params.logistic)?;
        let base = BaseModels::fit(x, &y, params, params.seed)?;

        Ok(Self {
            base,
            meta,
            threshold: params.threshold,
        })
    }

    pub fn predict(&self, features: &[f64; RATIO_COUNT]) -> PredictionResult {
        let base = self.base.predict(features);
        let stacked = self.meta.predict_proba(&base);
        PredictionResult {
            pd_logistic: base[0],
            pd_random_forest: base[1],
            pd_gradient_boosting: base[2],
            pd_stacking: stacked,
            label: if stacked >= self.threshold {
                DefaultLabel::LikelyDefault
            } else {
                DefaultLabel::LikelyHealthy
            },
            risk: PdRiskAssessment::from(stacked),
        }
    }

    pub fn predict_ratios(&self, ratios: &RatioVector) -> PredictionResult {
        self.predict(&ratios.to_features())
    }

    fn stacked_scores(&self, x: &[[f64; RATIO_COUNT]]) -> Vec<f64> {
        x.iter().map(|row| self.predict(row).pd_stacking).collect()
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// Everything needed to score and to report on a trained ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleArtifact {
    pub model: StackingEnsemble,
    pub params: EnsembleParams,
    pub metrics_train: ClassificationMetrics,
    pub metrics_test: ClassificationMetrics,
    pub feature_order: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

/// Training status and metrics, without the estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub trained: bool,
    pub trained_at: Option<DateTime<Utc>>,
    pub feature_order: Vec<String>,
    pub metrics_train: Option<ClassificationMetrics>,
    pub metrics_test: Option<ClassificationMetrics>,
}

impl ModelInfo {
    pub fn untrained() -> Self {
        Self {
            trained: false,
            trained_at: None,
            feature_order: RatioCode::feature_order(),
            metrics_train: None,
            metrics_test: None,
        }
    }
}

impl EnsembleArtifact {
    /// Split, fit and evaluate. The returned artifact is complete; nothing
    /// observes it until the caller publishes it.
    pub fn train(dataset: &TrainingDataset, params: &EnsembleParams) -> CreditRiskResult<Self> {
        params.validate()?;
        dataset.validate_for_training(params.min_class_count)?;

        let (train_idx, test_idx) = dataset.stratified_split(params.test_fraction, params.seed);
        let train = dataset.subset(&train_idx);
        let test = dataset.subset(&test_idx);
        info!(
            train = train.len(),
            test = test.len(),
            defaults = dataset.default_count(),
            "training default probability ensemble"
        );

        let x_train = train.features();
        let y_train = train.labels();
        let model = StackingEnsemble::fit(&x_train, &y_train, params)?;

        let metrics_train = ClassificationMetrics::evaluate(
            &y_train,
            &model.stacked_scores(&x_train),
            params.threshold,
        );
        let x_test = test.features();
        let metrics_test = ClassificationMetrics::evaluate(
            &test.labels(),
            &model.stacked_scores(&x_test),
            params.threshold,
        );
        info!(
            train_auc = metrics_train.auc,
            test_auc = metrics_test.auc,
            "default probability ensemble trained"
        );

        Ok(Self {
            model,
            params: *params,
            metrics_train,
            metrics_test,
            feature_order: RatioCode::feature_order(),
            trained_at: Utc::now(),
        })
    }

    /// A loaded artifact must use the current feature order.
    pub fn check_feature_order(&self) -> CreditRiskResult<()> {
        if self.feature_order != RatioCode::feature_order() {
            return Err(CreditRiskError::Persistence(format!(
                "Artifact feature order {:?} does not match X_1..X_14",
                self.feature_order
            )));
        }
        Ok(())
    }

    pub fn predict(&self, ratios: &RatioVector) -> PredictionResult {
        self.model.predict_ratios(ratios)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            trained: true,
            trained_at: Some(self.trained_at),
            feature_order: self.feature_order.clone(),
            metrics_train: Some(self.metrics_train),
            metrics_test: Some(self.metrics_test),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dataset::Observation;

    /// Healthy firms have high margins and coverage; defaulters are levered.
    pub(crate) fn synthetic_dataset(n: usize) -> TrainingDataset {
        TrainingDataset::new(
            (0..n)
                .map(|i| {
                    let default = i % 3 == 0;
                    let jitter = (i % 7) as f64 * 0.01;
                    let mut f = [0.0; RATIO_COUNT];
                    f[0] = if default { 0.05 } else { 0.30 } + jitter;
                    f[4] = if default { 0.85 } else { 0.40 } - jitter;
                    f[8] = if default { 0.8 } else { 5.0 } + jitter;
                    f[6] = if default { 0.7 } else { 1.8 } + jitter;
                    Observation {
                        features: f,
                        default,
                        months_to_default: None,
                    }
                })
                .collect(),
        )
    }

    fn small_params() -> EnsembleParams {
        EnsembleParams {
            forest: ForestParams {
                n_trees: 15,
                ..ForestParams::default()
            },
            boosting: BoostingParams {
                n_rounds: 20,
                ..BoostingParams::default()
            },
            ..EnsembleParams::default()
        }
    }

    #[test]
    fn test_train_and_predict() {
        let ds = synthetic_dataset(60);
        let artifact = EnsembleArtifact::train(&ds, &small_params()).unwrap();
        assert!(artifact.metrics_test.auc > 0.9, "{:?}", artifact.metrics_test);

        let risky = RatioVector::from_features(&ds.observations[0].features);
        let safe = RatioVector::from_features(&ds.observations[1].features);
        let p_risky = artifact.predict(&risky);
        let p_safe = artifact.predict(&safe);
        assert!(p_risky.pd_stacking > p_safe.pd_stacking);
        assert_eq!(p_risky.label, DefaultLabel::LikelyDefault);
        assert_eq!(p_safe.label, DefaultLabel::LikelyHealthy);
        for p in [
            p_risky.pd_logistic,
            p_risky.pd_random_forest,
            p_risky.pd_gradient_boosting,
            p_risky.pd_stacking,
        ] {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_training_is_reproducible_apart_from_timestamp() {
        let ds = synthetic_dataset(45);
        let a = EnsembleArtifact::train(&ds, &small_params()).unwrap();
        let b = EnsembleArtifact::train(&ds, &small_params()).unwrap();
        assert_eq!(a.model, b.model);
        assert_eq!(a.metrics_test, b.metrics_test);
    }

    #[test]
    fn test_too_few_defaults_rejected() {
        let ds = synthetic_dataset(9);
        assert!(matches!(
            EnsembleArtifact::train(&ds, &small_params()),
            Err(CreditRiskError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_artifact_roundtrips_through_json() {
        let ds = synthetic_dataset(45);
        let artifact = EnsembleArtifact::train(&ds, &small_params()).unwrap();
        let json = serde_json::to_string(&artifact).unwrap();
        let back: EnsembleArtifact = serde_json::from_str(&json).unwrap();
        let row = RatioVector::from_features(&ds.observations[3].features);
        assert_eq!(back.predict(&row), artifact.predict(&row));
        assert!(back.check_feature_order().is_ok());
    }

    #[test]
    fn test_bad_params_rejected() {
        let params = EnsembleParams {
            stacking_folds: 1,
            ..EnsembleParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_split_and_threshold_bounds_are_open() {
        for (test_fraction, threshold) in [(0.0, 0.5), (0.2, 0.0), (0.2, 1.0), (0.9, 0.5)] {
            let params = EnsembleParams {
                test_fraction,
                threshold,
                ..EnsembleParams::default()
            };
            assert!(
                matches!(params.validate(), Err(CreditRiskError::InvalidInput { .. })),
                "{test_fraction} {threshold}"
            );
        }
        let edge = EnsembleParams {
            test_fraction: 0.01,
            threshold: 0.99,
            ..EnsembleParams::default()
        };
        assert!(edge.validate().is_ok());
    }
}
