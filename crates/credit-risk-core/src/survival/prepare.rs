//! Time-to-event preparation.
//!
//! Observations without a recorded `months_to_default` get a synthetic one.
//! The step is pure given its seed so training runs are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::dataset::TrainingDataset;
use crate::ratios::RatioCode;
use crate::types::Months;

/// Observation window; non-defaulters are censored at its end.
pub const OBSERVATION_WINDOW_MONTHS: Months = 36.0;
pub const MIN_SYNTHETIC_MONTHS: Months = 6.0;
const BASE_MONTHS: i64 = 21;

/// One row of survival training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalRecord {
    pub features: [f64; crate::ratios::RATIO_COUNT],
    pub duration: Months,
    pub event: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparedSurvivalData {
    pub records: Vec<SurvivalRecord>,
    /// How many durations were synthesized rather than observed.
    pub synthesized: usize,
}

impl PreparedSurvivalData {
    pub fn durations(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.duration).collect()
    }

    pub fn events(&self) -> Vec<bool> {
        self.records.iter().map(|r| r.event).collect()
    }

    pub fn features(&self) -> Vec<[f64; crate::ratios::RATIO_COUNT]> {
        self.records.iter().map(|r| r.features).collect()
    }
}

/// Simple distress score: weak profitability, liquidity and coverage push it
/// up, leverage pushes it up.
pub fn distress_score(features: &[f64]) -> f64 {
    let x = |code: RatioCode| features.get(code.index()).copied().unwrap_or(0.0);
    -(x(RatioCode::X1) + x(RatioCode::X2) + x(RatioCode::X3) + x(RatioCode::X4))
        + (x(RatioCode::X5) + x(RatioCode::X6))
        - (x(RatioCode::X7) + x(RatioCode::X8))
        - (x(RatioCode::X9) + x(RatioCode::X10))
}

/// Synthetic months to default for a defaulted firm, given integer noise in
/// `[-9, 9)`. Result is clamped to `[6, 36]`.
pub fn synthetic_months(features: &[f64], noise: i64) -> Months {
    let risk_shift = (distress_score(features) * 3.0).trunc();
    let months = (BASE_MONTHS + noise) as f64 - risk_shift;
    months.clamp(MIN_SYNTHETIC_MONTHS, OBSERVATION_WINDOW_MONTHS)
}

/// Attach durations to every observation. Recorded durations are kept;
/// missing ones are synthesized for defaulters and censored at the window
/// end for survivors.
pub fn prepare_survival_data(dataset: &TrainingDataset, seed: u64) -> PreparedSurvivalData {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut synthesized = 0;
    let records = dataset
        .observations
        .iter()
        .map(|obs| {
            let duration = match obs.months_to_default {
                Some(months) => months,
                None => {
                    synthesized += 1;
                    if obs.default {
                        synthetic_months(&obs.features, rng.gen_range(-9..9))
                    } else {
                        OBSERVATION_WINDOW_MONTHS
                    }
                }
            };
            SurvivalRecord {
                features: obs.features,
                duration,
                event: obs.default,
            }
        })
        .collect();
    PreparedSurvivalData {
        records,
        synthesized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dataset::Observation;
    use crate::ratios::RATIO_COUNT;

    fn obs(default: bool, months: Option<f64>) -> Observation {
        Observation {
            features: [0.0; RATIO_COUNT],
            default,
            months_to_default: months,
        }
    }

    #[test]
    fn test_synthetic_months_clamped() {
        let mut distressed = [0.0; RATIO_COUNT];
        distressed[RatioCode::X6.index()] = 20.0;
        assert_eq!(synthetic_months(&distressed, 0), 6.0);

        let mut healthy = [0.0; RATIO_COUNT];
        healthy[RatioCode::X9.index()] = 20.0;
        assert_eq!(synthetic_months(&healthy, 8), 36.0);
    }

    #[test]
    fn test_synthetic_months_truncates_risk() {
        let mut f = [0.0; RATIO_COUNT];
        // score 0.9 -> 2.7 -> 2
        f[RatioCode::X5.index()] = 0.9;
        assert_eq!(synthetic_months(&f, 0), 19.0);
        // score -0.9 -> -2.7 -> -2
        f[RatioCode::X5.index()] = 0.0;
        f[RatioCode::X7.index()] = 0.9;
        assert_eq!(synthetic_months(&f, -3), 20.0);
    }

    #[test]
    fn test_survivors_censored_at_window() {
        let ds = TrainingDataset::new(vec![obs(false, None), obs(true, None), obs(true, Some(10.0))]);
        let prepared = prepare_survival_data(&ds, 42);
        assert_eq!(prepared.records[0].duration, 36.0);
        assert!(!prepared.records[0].event);
        assert!((6.0..=36.0).contains(&prepared.records[1].duration));
        assert_eq!(prepared.records[2].duration, 10.0);
        assert_eq!(prepared.synthesized, 2);
    }

    #[test]
    fn test_preparation_is_seeded() {
        let ds = TrainingDataset::new((0..20).map(|_| obs(true, None)).collect());
        assert_eq!(prepare_survival_data(&ds, 7), prepare_survival_data(&ds, 7));
    }
}
