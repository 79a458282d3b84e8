use clap::Args;
use serde_json::Value;

use credit_risk_core::models::TrainingDataset;
use credit_risk_core::registry::ModelRegistry;

use crate::input;

/// Arguments for training the default probability ensemble
#[derive(Args)]
pub struct TrainArgs {
    /// CSV with X_1..X_14 and default (0/1)
    #[arg(long)]
    pub data: String,
}

/// Arguments for scoring a ratio vector
#[derive(Args)]
pub struct PredictArgs {
    /// Path to a JSON ratio vector or extract-ratios output (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for scoring a statement workbook end to end
#[derive(Args)]
pub struct PredictStatementsArgs {
    /// Path to a JSON workbook (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn load_dataset(path: &str) -> Result<TrainingDataset, Box<dyn std::error::Error>> {
    let canonical = input::file::resolve_path(path)?;
    Ok(TrainingDataset::from_csv_path(&canonical)?)
}

pub fn run_train(args: TrainArgs, registry: &ModelRegistry) -> Result<Value, Box<dyn std::error::Error>> {
    let dataset = load_dataset(&args.data)?;
    let result = registry.train(&dataset)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_predict(args: PredictArgs, registry: &ModelRegistry) -> Result<Value, Box<dyn std::error::Error>> {
    let ratios = input::ratios_from_value(input::read_value(args.input.as_deref(), "Ratio vector")?)?;
    let result = registry.predict(&ratios)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_predict_statements(
    args: PredictStatementsArgs,
    registry: &ModelRegistry,
) -> Result<Value, Box<dyn std::error::Error>> {
    let bytes = input::read_bytes(args.input.as_deref(), "Statement workbook")?;
    let result = registry.predict_upload(&bytes)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_model_info(registry: &ModelRegistry) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(registry.model_info()?)?)
}
