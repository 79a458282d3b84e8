use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::models::logistic::sigmoid;
use crate::models::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }
}

/// Gradient-boosted trees on the binomial log-loss. Each round fits a tree
/// to the residuals `y - p` and sets leaf values by one Newton step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit<R: AsRef<[f64]>>(x: &[R], y: &[f64], params: &BoostingParams, seed: u64) -> Self {
        let n = y.len();
        let rate = if n == 0 {
            0.5
        } else {
            (y.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6)
        };
        let base_score = (rate / (1.0 - rate)).ln();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: 2,
            min_samples_leaf: params.min_samples_leaf,
            max_features: None,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let indices: Vec<usize> = (0..n).collect();
        let mut raw = vec![base_score; n];
        let mut trees = Vec::with_capacity(params.n_rounds);

        for _ in 0..params.n_rounds {
            let prob: Vec<f64> = raw.iter().map(|&f| sigmoid(f)).collect();
            let residual: Vec<f64> = y.iter().zip(&prob).map(|(t, p)| t - p).collect();

            let leaf_value = |rows: &[usize]| {
                let num: f64 = rows.iter().map(|&i| residual[i]).sum();
                let den: f64 = rows.iter().map(|&i| prob[i] * (1.0 - prob[i])).sum();
                if den < 1e-12 {
                    0.0
                } else {
                    num / den
                }
            };
            let tree = RegressionTree::fit(x, &residual, &indices, tree_params, leaf_value, &mut rng);

            for (f, row) in raw.iter_mut().zip(x) {
                *f += params.learning_rate * tree.predict(row.as_ref());
            }
            trees.push(tree);
        }

        Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
        }
    }

    pub fn decision(&self, row: &[f64]) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict(row))
                .sum::<f64>()
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rounds_predicts_base_rate() {
        let x: Vec<[f64; 1]> = (0..10).map(|i| [i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 2 { 1.0 } else { 0.0 }).collect();
        let params = BoostingParams {
            n_rounds: 0,
            ..BoostingParams::default()
        };
        let gbm = GradientBoosting::fit(&x, &y, &params, 42);
        assert!((gbm.predict_proba(&[3.0]) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_boosting_fits_step() {
        let x: Vec<[f64; 1]> = (0..50).map(|i| [i as f64]).collect();
        let y: Vec<f64> = (0..50).map(|i| if i >= 25 { 1.0 } else { 0.0 }).collect();
        let gbm = GradientBoosting::fit(&x, &y, &BoostingParams::default(), 42);
        assert!(gbm.predict_proba(&[45.0]) > 0.9);
        assert!(gbm.predict_proba(&[5.0]) < 0.1);
    }
}
