use serde::{Deserialize, Serialize};

use crate::error::CreditRiskError;
use crate::models::linalg::{solve, Standardizer};
use crate::CreditRiskResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    /// L2 penalty on the (standardized) slopes. The intercept is not penalized.
    pub l2: f64,
    pub max_iterations: u32,
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            l2: 1.0,
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// L2-regularized logistic regression fitted by iteratively reweighted
/// least squares on standardized inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub standardizer: Standardizer,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LogisticRegression {
    pub fn fit<R: AsRef<[f64]>>(
        x: &[R],
        y: &[f64],
        params: &LogisticParams,
    ) -> CreditRiskResult<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(CreditRiskError::InsufficientData(
                "Logistic regression needs one label per row".into(),
            ));
        }
        let standardizer = Standardizer::fit(x);
        let z = standardizer.transform_all(x);
        let p = standardizer.means.len();
        let dim = p + 1;

        let mut beta = vec![0.0; dim];
        let mut last_delta = f64::INFINITY;

        for _ in 0..params.max_iterations {
            let mut hessian = vec![vec![0.0; dim]; dim];
            let mut gradient = vec![0.0; dim];

            for (row, &target) in z.iter().zip(y) {
                let eta = beta[0] + row.iter().zip(&beta[1..]).map(|(a, b)| a * b).sum::<f64>();
                let mu = sigmoid(eta);
                let w = (mu * (1.0 - mu)).max(1e-10);
                let resid = target - mu;

                let xi = |j: usize| if j == 0 { 1.0 } else { row[j - 1] };
                for a in 0..dim {
                    gradient[a] += xi(a) * resid;
                    for b in a..dim {
                        hessian[a][b] += w * xi(a) * xi(b);
                    }
                }
            }
            for a in 0..dim {
                for b in 0..a {
                    hessian[a][b] = hessian[b][a];
                }
            }
            for j in 1..dim {
                hessian[j][j] += params.l2;
                gradient[j] -= params.l2 * beta[j];
            }

            let step = solve(hessian, gradient).ok_or_else(|| CreditRiskError::ConvergenceFailure {
                function: "logistic_regression".into(),
                iterations: params.max_iterations,
                last_delta,
            })?;
            last_delta = step.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
            for (b, s) in beta.iter_mut().zip(&step) {
                *b += s;
            }
            if last_delta < params.tolerance {
                return Ok(Self {
                    standardizer,
                    intercept: beta[0],
                    coefficients: beta[1..].to_vec(),
                });
            }
        }

        Err(CreditRiskError::ConvergenceFailure {
            function: "logistic_regression".into(),
            iterations: params.max_iterations,
            last_delta,
        })
    }

    pub fn decision(&self, row: &[f64]) -> f64 {
        let z = self.standardizer.transform(row);
        self.intercept
            + z.iter()
                .zip(&self.coefficients)
                .map(|(a, b)| a * b)
                .sum::<f64>()
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision(row))
    }
}
