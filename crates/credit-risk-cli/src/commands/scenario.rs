use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use credit_risk_core::registry::ModelRegistry;
use credit_risk_core::scenarios::{ScenarioPreset, ScenarioShock};

use crate::input;

/// Arguments for a ratio stress test
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SimulateArgs {
    /// Path to a JSON ratio vector or extract-ratios output (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Scenario: mild, moderate, crisis or custom
    #[arg(long, default_value = "moderate")]
    pub scenario: String,

    /// Revenue change in percent (custom scenario)
    #[arg(long)]
    pub revenue: Option<Decimal>,

    /// Interest expense change in percent (custom scenario)
    #[arg(long)]
    pub interest: Option<Decimal>,

    /// ROE change in percent (custom scenario)
    #[arg(long)]
    pub roe: Option<Decimal>,

    /// Current ratio change in percent (custom scenario)
    #[arg(long)]
    pub cr: Option<Decimal>,
}

fn custom_shock(args: &SimulateArgs) -> Option<ScenarioShock> {
    let any = args.revenue.is_some() || args.interest.is_some() || args.roe.is_some() || args.cr.is_some();
    any.then(|| {
        ScenarioShock::new(
            args.revenue.unwrap_or_default(),
            args.interest.unwrap_or_default(),
            args.roe.unwrap_or_default(),
            args.cr.unwrap_or_default(),
        )
    })
}

pub fn run_simulate(
    args: SimulateArgs,
    registry: &ModelRegistry,
) -> Result<Value, Box<dyn std::error::Error>> {
    let preset = ScenarioPreset::from_name(&args.scenario).ok_or_else(|| {
        format!(
            "Unknown scenario '{}': expected mild, moderate, crisis or custom",
            args.scenario
        )
    })?;
    let base = input::ratios_from_value(input::read_value(args.input.as_deref(), "Ratio vector")?)?;
    let result = registry.stress_test(&base, preset, custom_shock(&args))?;
    Ok(serde_json::to_value(result)?)
}
