use clap::{Args, ValueEnum};
use serde_json::Value;

use credit_risk_core::config::EngineConfig;
use credit_risk_core::ratios::{extract_ratios, PriorPeriodStrategy};
use credit_risk_core::statements::ingest::statements_from_upload;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorPeriodArg {
    /// Read the second-to-last period column
    Extract,
    /// Use 0.9 x the current period
    Estimate,
}

impl From<PriorPeriodArg> for PriorPeriodStrategy {
    fn from(arg: PriorPeriodArg) -> Self {
        match arg {
            PriorPeriodArg::Extract => PriorPeriodStrategy::ExtractPriorPeriod,
            PriorPeriodArg::Estimate => PriorPeriodStrategy::EstimateFromCurrent,
        }
    }
}

/// Arguments for ratio extraction
#[derive(Args)]
pub struct ExtractRatiosArgs {
    /// Path to a JSON workbook with the balance sheet, income statement and
    /// cash-flow tables (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// How averaged items get their prior-period value (defaults to config)
    #[arg(long, value_enum)]
    pub prior_period: Option<PriorPeriodArg>,
}

pub fn run_extract_ratios(
    args: ExtractRatiosArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let bytes = input::read_bytes(args.input.as_deref(), "Statement workbook")?;
    let statements = statements_from_upload(&bytes)?;
    let strategy = args
        .prior_period
        .map(PriorPeriodStrategy::from)
        .unwrap_or(config.prior_period);
    let result = extract_ratios(&statements, strategy)?;
    Ok(serde_json::to_value(result)?)
}
