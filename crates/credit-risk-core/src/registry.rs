//! Process-wide owner of the trained artifacts.
//!
//! Each artifact sits in its own slot as `RwLock<Option<Arc<_>>>`. Scoring
//! clones the `Arc` and releases the lock, so a retrain never blocks a
//! running prediction and a prediction never sees half of a new model. A slot
//! that is empty is filled from disk on first use; a missing file means the
//! model was never trained.
//!
//! Retraining builds the new artifact completely, writes it next to the old
//! file and renames it into place, and only then swaps the slot.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::default_probability::{EnsembleArtifact, ModelInfo, PredictionResult};
use crate::error::CreditRiskError;
use crate::models::dataset::TrainingDataset;
use crate::ratios::{extract_ratios, RatioExtraction, RatioVector};
use crate::scenarios::{run_stress, PdChange, ScenarioPreset, ScenarioShock, StressResult};
use crate::statements::{statements_from_upload, FinancialStatements};
use crate::survival::{
    EntityComparison, HazardRatioEntry, SurvivalArtifact, SurvivalModelKind, SurvivalResult,
    SurvivalTrainingSummary,
};
use crate::types::{with_metadata, with_metadata_f64, ComputationOutput};
use crate::CreditRiskResult;

pub const ENSEMBLE_FILE: &str = "model_stacking.json";
pub const SURVIVAL_FILE: &str = "survival_models.json";

const ENSEMBLE_MODEL: &str = "Default probability ensemble";
const SURVIVAL_MODEL: &str = "Survival model";

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Write `value` as JSON to `dir/file` via a temp file in the same directory.
pub fn persist_json<T: Serialize>(dir: &Path, file: &str, value: &T) -> CreditRiskResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let target = dir.join(file);
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(&target)
        .map_err(|e| CreditRiskError::Persistence(format!("{}: {}", target.display(), e.error)))?;
    Ok(target)
}

/// `Ok(None)` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> CreditRiskResult<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| CreditRiskError::Persistence(format!("{}: {e}", path.display())))
}

trait Artifact: Serialize + DeserializeOwned {
    const FILE: &'static str;
    const MODEL: &'static str;

    fn check(&self) -> CreditRiskResult<()>;
}

impl Artifact for EnsembleArtifact {
    const FILE: &'static str = ENSEMBLE_FILE;
    const MODEL: &'static str = ENSEMBLE_MODEL;

    fn check(&self) -> CreditRiskResult<()> {
        self.check_feature_order()
    }
}

impl Artifact for SurvivalArtifact {
    const FILE: &'static str = SURVIVAL_FILE;
    const MODEL: &'static str = SURVIVAL_MODEL;

    fn check(&self) -> CreditRiskResult<()> {
        self.check_feature_order()
    }
}

struct Slot<T> {
    current: RwLock<Option<Arc<T>>>,
}

impl<T: Artifact> Slot<T> {
    fn empty() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    fn peek(&self) -> Option<Arc<T>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current artifact, loading it from `dir` if the slot is empty. A failed
    /// load leaves the slot as it was.
    fn get(&self, dir: &Path) -> CreditRiskResult<Arc<T>> {
        if let Some(artifact) = self.peek() {
            return Ok(artifact);
        }

        let path = dir.join(T::FILE);
        let loaded: T = load_json(&path)?.ok_or_else(|| CreditRiskError::not_trained(T::MODEL))?;
        loaded.check()?;
        info!(path = %path.display(), "loaded {}", T::MODEL);

        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // another caller may have loaded or trained in the meantime
        let artifact = slot.get_or_insert_with(|| Arc::new(loaded)).clone();
        Ok(artifact)
    }

    fn publish(&self, artifact: Arc<T>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(artifact);
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementAssessment {
    pub extraction: RatioExtraction,
    pub prediction: PredictionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressAssessment {
    pub stress: StressResult,
    /// Present when a trained ensemble is available.
    pub pd_change: Option<PdChange>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct ModelRegistry {
    config: EngineConfig,
    ensemble: Slot<EnsembleArtifact>,
    survival: Slot<SurvivalArtifact>,
    /// Serializes train-persist-publish so the file and the slot agree.
    training: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ensemble: Slot::empty(),
            survival: Slot::empty(),
            training: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model_dir(&self) -> &Path {
        &self.config.model_dir
    }

    // -- default probability ------------------------------------------------

    pub fn train(&self, dataset: &TrainingDataset) -> CreditRiskResult<ComputationOutput<ModelInfo>> {
        let start = Instant::now();
        let params = self.config.ensemble;
        let _guard = self.training.lock().unwrap_or_else(PoisonError::into_inner);

        let artifact = EnsembleArtifact::train(dataset, &params)?;
        let path = persist_json(self.model_dir(), ENSEMBLE_FILE, &artifact)?;
        let info = artifact.info();
        self.ensemble.publish(Arc::new(artifact));
        info!(path = %path.display(), "published {ENSEMBLE_MODEL}");

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata_f64(
            "Stacked ensemble: logistic regression, random forest and gradient boosting \
             combined by a logistic meta-model on out-of-fold predictions",
            &params,
            Vec::new(),
            elapsed,
            info,
        ))
    }

    pub fn predict(&self, ratios: &RatioVector) -> CreditRiskResult<PredictionResult> {
        Ok(self.ensemble.get(self.model_dir())?.predict(ratios))
    }

    /// Training status; an untrained model is reported, not an error.
    pub fn model_info(&self) -> CreditRiskResult<ModelInfo> {
        match self.ensemble.get(self.model_dir()) {
            Ok(artifact) => Ok(artifact.info()),
            Err(CreditRiskError::NotTrained { .. }) => Ok(ModelInfo::untrained()),
            Err(e) => Err(e),
        }
    }

    /// Extract ratios from statements and score them.
    pub fn predict_statements(
        &self,
        statements: &FinancialStatements,
    ) -> CreditRiskResult<ComputationOutput<StatementAssessment>> {
        let start = Instant::now();
        let artifact = self.ensemble.get(self.model_dir())?;
        let extraction = extract_ratios(statements, self.config.prior_period)?;
        let prediction = artifact.predict(&extraction.result.ratios);

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata_f64(
            "Ratio extraction followed by stacked-ensemble scoring",
            &extraction.assumptions,
            extraction.warnings,
            elapsed,
            StatementAssessment {
                extraction: extraction.result,
                prediction,
            },
        ))
    }

    /// Same as [`predict_statements`](Self::predict_statements) for a raw
    /// JSON workbook upload.
    pub fn predict_upload(&self, bytes: &[u8]) -> CreditRiskResult<ComputationOutput<StatementAssessment>> {
        let statements = statements_from_upload(bytes)?;
        self.predict_statements(&statements)
    }

    /// Stress the ratios and, when a model is trained, report how the stacked
    /// PD moves.
    pub fn stress_test(
        &self,
        base: &RatioVector,
        preset: ScenarioPreset,
        custom: Option<ScenarioShock>,
    ) -> CreditRiskResult<ComputationOutput<StressAssessment>> {
        let start = Instant::now();
        let stress = run_stress(base, preset, custom)?;
        let mut warnings = stress.warnings;

        let pd_change = match self.ensemble.get(self.model_dir()) {
            Ok(artifact) => {
                let before = artifact.predict(&stress.result.base_ratios).pd_stacking;
                let after = artifact.predict(&stress.result.stressed_ratios).pd_stacking;
                Some(PdChange::between(before, after))
            }
            Err(CreditRiskError::NotTrained { .. }) => {
                warn!("stress test without a trained model; PD change omitted");
                warnings.push("No trained model; PD change not computed".into());
                None
            }
            Err(e) => return Err(e),
        };

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            &stress.methodology,
            &stress.assumptions,
            warnings,
            elapsed,
            StressAssessment {
                stress: stress.result,
                pd_change,
            },
        ))
    }

    // -- survival -----------------------------------------------------------

    pub fn train_survival(
        &self,
        dataset: &TrainingDataset,
    ) -> CreditRiskResult<ComputationOutput<SurvivalTrainingSummary>> {
        let start = Instant::now();
        let params = self.config.survival;
        let _guard = self.training.lock().unwrap_or_else(PoisonError::into_inner);

        let artifact = SurvivalArtifact::train(dataset, &params)?;
        let path = persist_json(self.model_dir(), SURVIVAL_FILE, &artifact)?;
        let summary = artifact.summary.clone();
        self.survival.publish(Arc::new(artifact));
        info!(path = %path.display(), "published {SURVIVAL_MODEL}");

        let mut warnings = Vec::new();
        if summary.synthesized_durations > 0 {
            warnings.push(format!(
                "{} of {} durations were synthesized from ratios",
                summary.synthesized_durations, summary.samples
            ));
        }

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata_f64(
            "Cox proportional hazards (Breslow), Kaplan-Meier and random survival forest",
            &params,
            warnings,
            elapsed,
            summary,
        ))
    }

    pub fn predict_survival(
        &self,
        ratios: &RatioVector,
        model: SurvivalModelKind,
    ) -> CreditRiskResult<SurvivalResult> {
        Ok(self.survival.get(self.model_dir())?.predict(ratios, model))
    }

    pub fn hazard_ratios(&self) -> CreditRiskResult<Vec<HazardRatioEntry>> {
        Ok(self.survival.get(self.model_dir())?.hazard_ratios().to_vec())
    }

    pub fn compare_survival(&self, entities: &[RatioVector]) -> CreditRiskResult<Vec<EntityComparison>> {
        if entities.is_empty() {
            return Err(CreditRiskError::InvalidInput {
                field: "entities".into(),
                reason: "At least one ratio vector is required".into(),
            });
        }
        Ok(self.survival.get(self.model_dir())?.compare(entities))
    }

    pub fn survival_summary(&self) -> CreditRiskResult<SurvivalTrainingSummary> {
        Ok(self.survival.get(self.model_dir())?.summary.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dataset::Observation;
    use crate::ratios::{RatioCode, RATIO_COUNT};
    use crate::survival::RsfParams;
    use tempfile::TempDir;

    fn dataset() -> TrainingDataset {
        TrainingDataset::new(
            (0..80)
                .map(|i| {
                    let default = i % 4 == 0;
                    let d = if default { 1.0 } else { 0.0 };
                    let mut f = [0.0; RATIO_COUNT];
                    f[RatioCode::X1.index()] = 0.3 - 0.15 * d + ((i * 7) % 10) as f64 * 0.03;
                    f[RatioCode::X5.index()] = 0.4 + 0.3 * d + ((i * 3) % 8) as f64 * 0.03;
                    f[RatioCode::X9.index()] = 3.0 - 1.5 * d + ((i * 5) % 9) as f64 * 0.25;
                    Observation {
                        features: f,
                        default,
                        months_to_default: None,
                    }
                })
                .collect(),
        )
    }

    fn registry(dir: &TempDir) -> ModelRegistry {
        let mut config = EngineConfig::default().with_model_dir(dir.path());
        config.ensemble.forest.n_trees = 10;
        config.ensemble.boosting.n_rounds = 20;
        config.survival.rsf = RsfParams {
            n_trees: 10,
            ..RsfParams::default()
        };
        ModelRegistry::new(config)
    }

    #[test]
    fn test_untrained_prediction_is_not_trained() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let err = reg.predict(&RatioVector::zeros()).unwrap_err();
        assert!(matches!(err, CreditRiskError::NotTrained { .. }));
        assert!(!reg.model_info().unwrap().trained);
    }

    #[test]
    fn test_train_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let out = reg.train(&dataset()).unwrap();
        assert!(out.result.trained);
        assert!(dir.path().join(ENSEMBLE_FILE).exists());

        let sample = RatioVector::from_features(&dataset().observations[0].features);
        let before = reg.predict(&sample).unwrap();

        let fresh = registry(&dir);
        let after = fresh.predict(&sample).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_corrupt_artifact_is_a_persistence_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ENSEMBLE_FILE), "{not json").unwrap();
        let reg = registry(&dir);
        let err = reg.predict(&RatioVector::zeros()).unwrap_err();
        assert!(matches!(err, CreditRiskError::Persistence(_)));
    }

    #[test]
    fn test_loaded_model_survives_file_corruption() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.train(&dataset()).unwrap();
        fs::write(dir.path().join(ENSEMBLE_FILE), "garbage").unwrap();
        assert!(reg.predict(&RatioVector::zeros()).is_ok());
    }

    #[test]
    fn test_stress_without_model_omits_pd() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let out = reg
            .stress_test(&RatioVector::zeros(), ScenarioPreset::Mild, None)
            .unwrap();
        assert!(out.result.pd_change.is_none());
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_stress_with_model_reports_pd_change() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.train(&dataset()).unwrap();
        let base = RatioVector::from_features(&dataset().observations[1].features);
        let out = reg.stress_test(&base, ScenarioPreset::Crisis, None).unwrap();
        let change = out.result.pd_change.unwrap();
        assert!((0.0..=1.0).contains(&change.before));
        assert!((0.0..=1.0).contains(&change.after));
    }

    #[test]
    fn test_survival_lifecycle() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        assert!(matches!(
            reg.hazard_ratios(),
            Err(CreditRiskError::NotTrained { .. })
        ));

        let summary = reg.train_survival(&dataset()).unwrap();
        assert_eq!(summary.result.events, 20);
        assert!(dir.path().join(SURVIVAL_FILE).exists());

        let fresh = registry(&dir);
        assert_eq!(fresh.hazard_ratios().unwrap().len(), RATIO_COUNT);
        let sample = RatioVector::from_features(&dataset().observations[0].features);
        let result = fresh.predict_survival(&sample, SurvivalModelKind::Cox).unwrap();
        assert_eq!(result.survival_curve[0].survival_prob, 1.0);
        assert!(fresh.compare_survival(&[]).is_err());
    }
}
