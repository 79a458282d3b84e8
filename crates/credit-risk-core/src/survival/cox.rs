//! Cox proportional hazards model.
//!
//! Fitted by Newton-Raphson on the Breslow partial likelihood over
//! standardized covariates, with a small ridge penalty and step halving.
//! The baseline cumulative hazard is the Breslow estimator, so
//! `S(t | x) = exp(-H0(t) * exp(beta . z(x)))` where `z` is the
//! standardized covariate vector.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use crate::error::CreditRiskError;
use crate::models::linalg::{invert, solve, Standardizer};
use crate::survival::curve::SurvivalCurve;
use crate::CreditRiskResult;

/// Bound on |ln HR| per original unit. A ratio with a tiny spread can carry
/// an unbounded per-unit coefficient; the hazard ratio stays finite.
pub const MAX_LOG_HAZARD_RATIO: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoxParams {
    pub ridge: f64,
    pub max_iterations: u32,
    pub tolerance: f64,
}

impl Default for CoxParams {
    fn default() -> Self {
        Self {
            ridge: 0.01,
            max_iterations: 100,
            tolerance: 1e-9,
        }
    }
}

/// Per-covariate estimate on the original (unstandardized) scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoxCoefficient {
    pub coefficient: f64,
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
    pub hazard_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoxModel {
    standardizer: Standardizer,
    /// Coefficients on the standardized scale.
    beta: Vec<f64>,
    /// Breslow cumulative baseline hazard at every distinct training time.
    baseline: Vec<(f64, f64)>,
    coefficients: Vec<CoxCoefficient>,
    log_likelihood: f64,
    iterations: u32,
}

struct Derivatives {
    log_likelihood: f64,
    gradient: Vec<f64>,
    information: Vec<Vec<f64>>,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Indices sorted by time, latest first.
fn descending_order(durations: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..durations.len()).collect();
    order.sort_by(|&a, &b| durations[b].total_cmp(&durations[a]));
    order
}

/// Penalized Breslow log partial likelihood with its gradient and observed
/// information. The linear predictor is shifted by its maximum to keep the
/// exponentials finite.
fn derivatives(
    z: &[Vec<f64>],
    durations: &[f64],
    events: &[bool],
    order: &[usize],
    beta: &[f64],
    ridge: f64,
) -> Derivatives {
    let p = beta.len();
    let eta: Vec<f64> = z.iter().map(|row| dot(row, beta)).collect();
    let shift = eta.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let shift = if shift.is_finite() { shift } else { 0.0 };

    let mut s0 = 0.0;
    let mut s1 = vec![0.0; p];
    let mut s2 = vec![vec![0.0; p]; p];
    let mut ll = 0.0;
    let mut gradient = vec![0.0; p];
    let mut information = vec![vec![0.0; p]; p];

    let mut k = 0;
    while k < order.len() {
        let t = durations[order[k]];
        let group_start = k;
        while k < order.len() && durations[order[k]] == t {
            let i = order[k];
            let w = (eta[i] - shift).exp();
            s0 += w;
            for a in 0..p {
                s1[a] += w * z[i][a];
                for b in 0..p {
                    s2[a][b] += w * z[i][a] * z[i][b];
                }
            }
            k += 1;
        }
        for &i in &order[group_start..k] {
            if !events[i] {
                continue;
            }
            ll += (eta[i] - shift) - s0.ln();
            for a in 0..p {
                let mean_a = s1[a] / s0;
                gradient[a] += z[i][a] - mean_a;
                for b in 0..p {
                    information[a][b] += s2[a][b] / s0 - mean_a * s1[b] / s0;
                }
            }
        }
    }

    for a in 0..p {
        ll -= 0.5 * ridge * beta[a] * beta[a];
        gradient[a] -= ridge * beta[a];
        information[a][a] += ridge;
    }

    Derivatives {
        log_likelihood: ll,
        gradient,
        information,
    }
}

impl CoxModel {
    pub fn fit<R: AsRef<[f64]>>(
        x: &[R],
        durations: &[f64],
        events: &[bool],
        params: &CoxParams,
    ) -> CreditRiskResult<Self> {
        if x.is_empty() || x.len() != durations.len() || x.len() != events.len() {
            return Err(CreditRiskError::InsufficientData(
                "Cox model needs one duration and event flag per row".into(),
            ));
        }
        if !events.iter().any(|&e| e) {
            return Err(CreditRiskError::InsufficientData(
                "Cox model needs at least one observed default".into(),
            ));
        }

        let standardizer = Standardizer::fit(x);
        let z = standardizer.transform_all(x);
        let p = standardizer.means.len();
        let order = descending_order(durations);

        let mut beta = vec![0.0; p];
        let mut current = derivatives(&z, durations, events, &order, &beta, params.ridge);
        let mut converged = false;
        let mut iterations = 0;
        let mut last_delta = f64::INFINITY;

        while iterations < params.max_iterations {
            iterations += 1;
            let step = solve(current.information.clone(), current.gradient.clone()).ok_or_else(
                || CreditRiskError::ConvergenceFailure {
                    function: "cox_newton_raphson".into(),
                    iterations,
                    last_delta,
                },
            )?;

            let mut scale = 1.0;
            let mut candidate_beta;
            let mut candidate;
            loop {
                candidate_beta = beta.iter().zip(&step).map(|(b, s)| b + scale * s).collect::<Vec<_>>();
                candidate = derivatives(&z, durations, events, &order, &candidate_beta, params.ridge);
                if candidate.log_likelihood >= current.log_likelihood - 1e-12 || scale < 1e-6 {
                    break;
                }
                scale *= 0.5;
            }

            last_delta = (candidate.log_likelihood - current.log_likelihood).abs();
            let max_step = step.iter().fold(0.0_f64, |m, s| m.max((scale * s).abs()));
            beta = candidate_beta;
            current = candidate;
            if last_delta < params.tolerance || max_step < params.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(CreditRiskError::ConvergenceFailure {
                function: "cox_newton_raphson".into(),
                iterations,
                last_delta,
            });
        }
        debug!(iterations, log_likelihood = current.log_likelihood, "cox model converged");

        let covariance = invert(&current.information).ok_or_else(|| {
            CreditRiskError::ConvergenceFailure {
                function: "cox_information_inverse".into(),
                iterations,
                last_delta,
            }
        })?;
        let normal = Normal::new(0.0, 1.0).map_err(|e| CreditRiskError::InvalidInput {
            field: "normal".into(),
            reason: e.to_string(),
        })?;
        let coefficients = (0..p)
            .map(|j| {
                let scale = standardizer.scales[j];
                let coefficient = beta[j] / scale;
                let std_error = covariance[j][j].max(0.0).sqrt() / scale;
                let z = if std_error > 0.0 { coefficient / std_error } else { 0.0 };
                CoxCoefficient {
                    coefficient,
                    std_error,
                    z,
                    p_value: 2.0 * (1.0 - normal.cdf(z.abs())),
                    hazard_ratio: coefficient
                        .clamp(-MAX_LOG_HAZARD_RATIO, MAX_LOG_HAZARD_RATIO)
                        .exp(),
                }
            })
            .collect::<Vec<_>>();

        let baseline = breslow_baseline(&z, durations, events, &order, &beta);

        // everything below is persisted as JSON, which has no inf or NaN
        let finite = beta.iter().all(|v| v.is_finite())
            && baseline.iter().all(|(t, h)| t.is_finite() && h.is_finite())
            && coefficients.iter().all(|c| {
                [c.coefficient, c.std_error, c.z, c.p_value, c.hazard_ratio]
                    .iter()
                    .all(|v| v.is_finite())
            });
        if !finite {
            return Err(CreditRiskError::ConvergenceFailure {
                function: "cox_newton_raphson".into(),
                iterations,
                last_delta,
            });
        }

        Ok(Self {
            standardizer,
            beta,
            baseline,
            coefficients,
            log_likelihood: current.log_likelihood,
            iterations,
        })
    }

    pub fn coefficients(&self) -> &[CoxCoefficient] {
        &self.coefficients
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// `exp(beta . z(x))`, relative to an average firm.
    pub fn partial_hazard(&self, row: &[f64]) -> f64 {
        dot(&self.standardizer.transform(row), &self.beta).exp()
    }

    pub fn survival_curve(&self, row: &[f64]) -> SurvivalCurve {
        let risk = self.partial_hazard(row);
        SurvivalCurve::from_points(
            self.baseline
                .iter()
                .map(|&(t, h0)| (t, (-h0 * risk).exp()))
                .collect(),
        )
    }
}

fn breslow_baseline(
    z: &[Vec<f64>],
    durations: &[f64],
    events: &[bool],
    order: &[usize],
    beta: &[f64],
) -> Vec<(f64, f64)> {
    // risk-set sums at each distinct time, accumulated latest first
    let mut steps: Vec<(f64, f64)> = Vec::new();
    let mut s0 = 0.0;
    let mut k = 0;
    while k < order.len() {
        let t = durations[order[k]];
        let mut deaths = 0.0;
        while k < order.len() && durations[order[k]] == t {
            let i = order[k];
            s0 += dot(&z[i], beta).exp();
            if events[i] {
                deaths += 1.0;
            }
            k += 1;
        }
        let increment = if s0 > 0.0 { deaths / s0 } else { 0.0 };
        steps.push((t, increment));
    }
    steps.reverse();

    let mut cumulative = 0.0;
    steps
        .into_iter()
        .map(|(t, inc)| {
            cumulative += inc;
            (t, cumulative)
        })
        .collect()
}
