//! Engine configuration.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! The core reads JSON; YAML is handled by the CLI with the same types.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::default_probability::EnsembleParams;
use crate::error::CreditRiskError;
use crate::ratios::PriorPeriodStrategy;
use crate::survival::SurvivalParams;
use crate::CreditRiskResult;

pub const DEFAULT_MODEL_DIR: &str = "models";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding `model_stacking.json` and `survival_models.json`.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default)]
    pub prior_period: PriorPeriodStrategy,

    #[serde(default)]
    pub ensemble: EnsembleParams,

    #[serde(default)]
    pub survival: SurvivalParams,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_DIR)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            prior_period: PriorPeriodStrategy::default(),
            ensemble: EnsembleParams::default(),
            survival: SurvivalParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> CreditRiskResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| CreditRiskError::InvalidInput {
            field: "config".into(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> CreditRiskResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| CreditRiskError::InvalidInput {
            field: "config".into(),
            reason: format!("Failed to read '{}': {e}", path.display()),
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> CreditRiskResult<()> {
        if self.model_dir.as_os_str().is_empty() {
            return Err(CreditRiskError::InvalidInput {
                field: "model_dir".into(),
                reason: "Must not be empty".into(),
            });
        }
        self.ensemble.validate()?;
        if self.survival.min_events == 0 {
            return Err(CreditRiskError::InvalidInput {
                field: "survival.min_events".into(),
                reason: "Must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }
}
