use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::tree::{mean_of, RegressionTree, TreeParams};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }
}

/// `sqrt(n_features)` rounded down, at least one.
pub fn sqrt_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).max(1)
}

/// Bagged classification trees; the probability is the mean leaf default
/// rate across trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit<R: AsRef<[f64]>>(x: &[R], y: &[f64], params: &ForestParams, seed: u64) -> Self {
        let n = x.len();
        let n_features = x.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(sqrt_features(n_features)),
        };
        let mut rng = StdRng::seed_from_u64(seed);

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let sample: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, &sample, tree_params, |s| mean_of(y, s), &mut rng)
            })
            .collect();
        Self { trees }
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        (total / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}
