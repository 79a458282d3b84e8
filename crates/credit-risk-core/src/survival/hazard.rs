use serde::{Deserialize, Serialize};

use crate::ratios::RatioCode;
use crate::survival::cox::CoxCoefficient;

const INCREASE_THRESHOLD: f64 = 1.2;
const DECREASE_THRESHOLD: f64 = 0.8;

fn round_to(value: f64, dp: i32) -> f64 {
    let scale = 10f64.powi(dp);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRatioEntry {
    pub code: RatioCode,
    pub name: String,
    pub hazard_ratio: f64,
    pub log_hr: f64,
    pub coefficient: f64,
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
    pub interpretation: String,
}

/// Plain-language reading of a hazard ratio.
pub fn interpret_hazard_ratio(hr: f64) -> String {
    if hr > INCREASE_THRESHOLD {
        format!("Increases default risk by {}%", round_to((hr - 1.0) * 100.0, 1))
    } else if hr < DECREASE_THRESHOLD {
        format!("Decreases default risk by {}%", round_to((1.0 - hr) * 100.0, 1))
    } else {
        "Negligible effect".to_string()
    }
}

/// One entry per ratio, strongest effect (largest |ln HR|) first.
pub fn hazard_ratio_report(coefficients: &[CoxCoefficient]) -> Vec<HazardRatioEntry> {
    let mut entries: Vec<HazardRatioEntry> = RatioCode::ALL
        .iter()
        .zip(coefficients)
        .map(|(&code, c)| HazardRatioEntry {
            code,
            name: code.name().to_string(),
            hazard_ratio: round_to(c.hazard_ratio, 4),
            log_hr: round_to(c.hazard_ratio.ln(), 4),
            coefficient: c.coefficient,
            std_error: c.std_error,
            z: c.z,
            p_value: c.p_value,
            interpretation: interpret_hazard_ratio(c.hazard_ratio),
        })
        .collect();
    entries.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
    entries
}
