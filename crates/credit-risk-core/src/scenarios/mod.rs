pub mod stress;

pub use stress::{
    run_stress, shock_for, simulate, simulate_scenario, PdChange, RatioShift, ScenarioPreset,
    ScenarioShock, StressResult,
};
