use clap::{Args, ValueEnum};
use serde_json::Value;

use credit_risk_core::registry::ModelRegistry;
use credit_risk_core::survival::SurvivalModelKind;

use super::pd::load_dataset;
use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SurvivalModelArg {
    /// Cox proportional hazards
    Cox,
    /// Random survival forest
    Rsf,
}

impl From<SurvivalModelArg> for SurvivalModelKind {
    fn from(arg: SurvivalModelArg) -> Self {
        match arg {
            SurvivalModelArg::Cox => SurvivalModelKind::Cox,
            SurvivalModelArg::Rsf => SurvivalModelKind::Rsf,
        }
    }
}

/// Arguments for training the survival models
#[derive(Args)]
pub struct SurvivalTrainArgs {
    /// CSV with X_1..X_14, default (0/1) and optional months_to_default
    #[arg(long)]
    pub data: String,
}

/// Arguments for a survival curve
#[derive(Args)]
pub struct SurvivalPredictArgs {
    /// Path to a JSON ratio vector or extract-ratios output (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Model producing the curve
    #[arg(long, value_enum, default_value = "cox")]
    pub model: SurvivalModelArg,
}

/// Arguments for comparing several entities
#[derive(Args)]
pub struct SurvivalCompareArgs {
    /// Path to a JSON array of ratio vectors (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_survival_train(
    args: SurvivalTrainArgs,
    registry: &ModelRegistry,
) -> Result<Value, Box<dyn std::error::Error>> {
    let dataset = load_dataset(&args.data)?;
    Ok(serde_json::to_value(registry.train_survival(&dataset)?)?)
}

pub fn run_survival_predict(
    args: SurvivalPredictArgs,
    registry: &ModelRegistry,
) -> Result<Value, Box<dyn std::error::Error>> {
    let ratios = input::ratios_from_value(input::read_value(args.input.as_deref(), "Ratio vector")?)?;
    let result = registry.predict_survival(&ratios, args.model.into())?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_hazard_ratios(registry: &ModelRegistry) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(registry.hazard_ratios()?)?)
}

pub fn run_survival_compare(
    args: SurvivalCompareArgs,
    registry: &ModelRegistry,
) -> Result<Value, Box<dyn std::error::Error>> {
    let value = input::read_value(args.input.as_deref(), "Ratio vectors")?;
    let Value::Array(items) = value else {
        return Err("Expected a JSON array of ratio vectors".into());
    };
    let entities = items
        .into_iter()
        .map(input::ratios_from_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_value(registry.compare_survival(&entities)?)?)
}
