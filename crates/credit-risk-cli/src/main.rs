mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use credit_risk_core::registry::ModelRegistry;

use commands::pd::{PredictArgs, PredictStatementsArgs, TrainArgs};
use commands::ratios::ExtractRatiosArgs;
use commands::scenario::SimulateArgs;
use commands::survival::{SurvivalCompareArgs, SurvivalPredictArgs, SurvivalTrainArgs};

/// Corporate credit risk: financial ratios, stress scenarios, default
/// probability and time to default
#[derive(Parser)]
#[command(
    name = "crisk",
    version,
    about = "Corporate credit risk scoring from financial statements",
    long_about = "Extracts fourteen financial ratios from balance sheet, income statement \
                  and cash-flow tables, stress-tests them, scores default probability with \
                  a stacked ensemble and models time to default with Cox, Kaplan-Meier \
                  and random survival forest models."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Directory for trained model artifacts (overrides the config file)
    #[arg(long, global = true)]
    model_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the 14 financial ratios from a statement workbook
    ExtractRatios(ExtractRatiosArgs),
    /// Stress a ratio vector under a scenario and report the PD change
    Simulate(SimulateArgs),
    /// Train the default probability ensemble from a CSV dataset
    Train(TrainArgs),
    /// Score a ratio vector with the default probability ensemble
    Predict(PredictArgs),
    /// Extract ratios from a workbook and score them
    PredictStatements(PredictStatementsArgs),
    /// Show training status and metrics of the ensemble
    ModelInfo,
    /// Train the survival models from a CSV dataset
    SurvivalTrain(SurvivalTrainArgs),
    /// Survival curve and time to default for a ratio vector
    SurvivalPredict(SurvivalPredictArgs),
    /// Cox hazard ratios for every financial ratio
    HazardRatios,
    /// Compare survival curves of several entities
    SurvivalCompare(SurvivalCompareArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(
    command: Commands,
    config_path: Option<&str>,
    model_dir: Option<&str>,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let config = input::config::load_engine_config(config_path, model_dir)?;
    let registry = ModelRegistry::new(config);

    match command {
        Commands::ExtractRatios(args) => commands::ratios::run_extract_ratios(args, registry.config()),
        Commands::Simulate(args) => commands::scenario::run_simulate(args, &registry),
        Commands::Train(args) => commands::pd::run_train(args, &registry),
        Commands::Predict(args) => commands::pd::run_predict(args, &registry),
        Commands::PredictStatements(args) => commands::pd::run_predict_statements(args, &registry),
        Commands::ModelInfo => commands::pd::run_model_info(&registry),
        Commands::SurvivalTrain(args) => commands::survival::run_survival_train(args, &registry),
        Commands::SurvivalPredict(args) => commands::survival::run_survival_predict(args, &registry),
        Commands::HazardRatios => commands::survival::run_hazard_ratios(&registry),
        Commands::SurvivalCompare(args) => commands::survival::run_survival_compare(args, &registry),
        Commands::Version => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Version => {
            println!("crisk {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        command => run(command, cli.config.as_deref(), cli.model_dir.as_deref()),
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
