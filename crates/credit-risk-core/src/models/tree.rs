//! Binary regression trees grown by variance reduction.
//!
//! On 0/1 targets variance reduction picks the same splits as Gini impurity,
//! so the same tree serves the random forest (leaf = default rate) and the
//! boosting rounds (leaf = Newton step supplied by the caller).

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct Grower<'a, R, F> {
    x: &'a [R],
    y: &'a [f64],
    params: TreeParams,
    leaf_value: F,
    n_features: usize,
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Grow a tree on the rows in `indices` (duplicates allowed, as in a
    /// bootstrap sample).
    pub fn fit<R, F>(
        x: &[R],
        y: &[f64],
        indices: &[usize],
        params: TreeParams,
        leaf_value: F,
        rng: &mut StdRng,
    ) -> Self
    where
        R: AsRef<[f64]>,
        F: Fn(&[usize]) -> f64,
    {
        let n_features = x.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut grower = Grower {
            x,
            y,
            params,
            leaf_value,
            n_features,
            nodes: Vec::new(),
        };
        let mut root = indices.to_vec();
        grower.grow(&mut root, 0, rng);
        Self {
            nodes: grower.nodes,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes.get(i) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    i = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }
}

impl<'a, R, F> Grower<'a, R, F>
where
    R: AsRef<[f64]>,
    F: Fn(&[usize]) -> f64,
{
    fn value(&self, row: usize, feature: usize) -> f64 {
        self.x[row].as_ref()[feature]
    }

    fn grow(&mut self, indices: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: 0.0 });

        let can_split = depth < self.params.max_depth
            && indices.len() >= self.params.min_samples_split.max(2)
            && indices.len() >= 2 * self.params.min_samples_leaf.max(1);

        let split = if can_split {
            self.best_split(indices, rng)
        } else {
            None
        };

        if let Some((feature, threshold)) = split {
            let mid = partition(indices, |&i| self.value(i, feature) <= threshold);
            let (left_idx, right_idx) = indices.split_at_mut(mid);
            let left = self.grow(left_idx, depth + 1, rng);
            let right = self.grow(right_idx, depth + 1, rng);
            self.nodes[id] = TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            };
        } else {
            self.nodes[id] = TreeNode::Leaf {
                value: (self.leaf_value)(indices),
            };
        }
        id
    }

    fn candidate_features(&self, rng: &mut StdRng) -> Vec<usize> {
        match self.params.max_features {
            Some(k) if k < self.n_features => {
                rand::seq::index::sample(rng, self.n_features, k.max(1)).into_vec()
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<(usize, f64)> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent_sse = total_sq - total * total / n as f64;

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = indices.to_vec();

        for feature in self.candidate_features(rng) {
            order.sort_by(|&a, &b| self.value(a, feature).total_cmp(&self.value(b, feature)));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..n - 1 {
                let yi = self.y[order[k]];
                left_sum += yi;
                left_sq += yi * yi;

                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let here = self.value(order[k], feature);
                let next = self.value(order[k + 1], feature);
                if here >= next {
                    continue;
                }

                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left as f64)
                    + (right_sq - right_sum * right_sum / n_right as f64);
                let gain = parent_sse - sse;
                if gain > MIN_GAIN && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, (here + next) / 2.0, gain));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

/// In-place partition; returns the number of elements satisfying `pred`.
fn partition<T, P: Fn(&T) -> bool>(items: &mut [T], pred: P) -> usize {
    let mut mid = 0;
    for i in 0..items.len() {
        if pred(&items[i]) {
            items.swap(mid, i);
            mid += 1;
        }
    }
    mid
}

/// Mean target over `indices`.
pub fn mean_of(y: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}
