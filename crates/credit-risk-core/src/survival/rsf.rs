//! Random survival forest.
//!
//! Trees split on the log-rank statistic and store a Nelson-Aalen cumulative
//! hazard in every leaf, evaluated on the forest-wide grid of distinct event
//! times. The ensemble hazard is the mean over trees and `S = exp(-H)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::forest::sqrt_features;
use crate::survival::curve::SurvivalCurve;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsfParams {
    pub n_trees: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// `None` grows until the size limits stop it.
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for RsfParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            min_samples_split: 10,
            min_samples_leaf: 5,
            max_depth: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SurvivalNode {
    Leaf {
        cumulative_hazard: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SurvivalTree {
    nodes: Vec<SurvivalNode>,
}

impl SurvivalTree {
    fn leaf_hazard(&self, row: &[f64]) -> Option<&[f64]> {
        let mut i = 0;
        loop {
            match self.nodes.get(i)? {
                SurvivalNode::Leaf { cumulative_hazard } => {
                    return Some(cumulative_hazard.as_slice())
                }
                SurvivalNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    i = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSurvivalForest {
    /// Distinct event times, ascending.
    event_times: Vec<f64>,
    trees: Vec<SurvivalTree>,
}

struct Grower<'a, R> {
    x: &'a [R],
    events: &'a [bool],
    grid: &'a [f64],
    /// Position of each row's duration in the grid if it is an event.
    event_slot: Vec<Option<usize>>,
    /// Number of grid times at or before each row's duration.
    risk_span: Vec<usize>,
    params: RsfParams,
    n_features: usize,
    max_features: usize,
    nodes: Vec<SurvivalNode>,
}

impl<'a, R: AsRef<[f64]>> Grower<'a, R> {
    fn new(
        x: &'a [R],
        durations: &'a [f64],
        events: &'a [bool],
        grid: &'a [f64],
        params: RsfParams,
    ) -> Self {
        let n_features = x.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let event_slot = durations
            .iter()
            .zip(events)
            .map(|(&d, &e)| {
                if e {
                    grid.binary_search_by(|g| g.total_cmp(&d)).ok()
                } else {
                    None
                }
            })
            .collect();
        let risk_span = durations
            .iter()
            .map(|&d| grid.partition_point(|&g| g <= d))
            .collect();
        Self {
            x,
            events,
            grid,
            event_slot,
            risk_span,
            params,
            n_features,
            max_features: sqrt_features(n_features),
            nodes: Vec::new(),
        }
    }

    fn value(&self, row: usize, feature: usize) -> f64 {
        self.x[row].as_ref()[feature]
    }

    /// At-risk and event counts per grid time for `rows`.
    fn counts(&self, rows: &[usize]) -> (Vec<f64>, Vec<f64>) {
        let t = self.grid.len();
        let mut at_risk = vec![0.0; t];
        let mut deaths = vec![0.0; t];
        for &i in rows {
            for slot in at_risk.iter_mut().take(self.risk_span[i]) {
                *slot += 1.0;
            }
            if let Some(k) = self.event_slot[i] {
                deaths[k] += 1.0;
            }
        }
        (at_risk, deaths)
    }

    fn nelson_aalen(&self, rows: &[usize]) -> Vec<f64> {
        let (at_risk, deaths) = self.counts(rows);
        let mut h = 0.0;
        at_risk
            .iter()
            .zip(&deaths)
            .map(|(&n, &d)| {
                if n > 0.0 {
                    h += d / n;
                }
                h
            })
            .collect()
    }

    fn grow(&mut self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        self.nodes.push(SurvivalNode::Leaf {
            cumulative_hazard: Vec::new(),
        });

        let depth_ok = self.params.max_depth.map_or(true, |m| depth < m);
        let has_event = rows.iter().any(|&i| self.events[i]);
        let split = if depth_ok
            && has_event
            && rows.len() >= self.params.min_samples_split.max(2)
            && rows.len() >= 2 * self.params.min_samples_leaf.max(1)
        {
            self.best_split(rows, rng)
        } else {
            None
        };

        if let Some((feature, threshold)) = split {
            let mut mid = 0;
            for k in 0..rows.len() {
                if self.value(rows[k], feature) <= threshold {
                    rows.swap(mid, k);
                    mid += 1;
                }
            }
            let (left_rows, right_rows) = rows.split_at_mut(mid);
            let left = self.grow(left_rows, depth + 1, rng);
            let right = self.grow(right_rows, depth + 1, rng);
            self.nodes[id] = SurvivalNode::Split {
                feature,
                threshold,
                left,
                right,
            };
        } else {
            self.nodes[id] = SurvivalNode::Leaf {
                cumulative_hazard: self.nelson_aalen(rows),
            };
        }
        id
    }

    fn best_split(&self, rows: &[usize], rng: &mut StdRng) -> Option<(usize, f64)> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let (node_at_risk, node_deaths) = self.counts(rows);
        let t = self.grid.len();

        let features = if self.max_features < self.n_features {
            rand::seq::index::sample(rng, self.n_features, self.max_features).into_vec()
        } else {
            (0..self.n_features).collect()
        };

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = rows.to_vec();
        for feature in features {
            order.sort_by(|&a, &b| self.value(a, feature).total_cmp(&self.value(b, feature)));

            let mut left_at_risk = vec![0.0; t];
            let mut left_deaths = vec![0.0; t];
            for k in 0..n - 1 {
                let i = order[k];
                for slot in left_at_risk.iter_mut().take(self.risk_span[i]) {
                    *slot += 1.0;
                }
                if let Some(s) = self.event_slot[i] {
                    left_deaths[s] += 1.0;
                }

                let n_left = k + 1;
                if n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }
                let here = self.value(i, feature);
                let next = self.value(order[k + 1], feature);
                if here >= next {
                    continue;
                }

                let stat = log_rank(&left_at_risk, &left_deaths, &node_at_risk, &node_deaths);
                if stat > 0.0 && best.map_or(true, |(_, _, s)| stat > s) {
                    best = Some((feature, (here + next) / 2.0, stat));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

/// Standardized log-rank statistic of the left group against the node.
fn log_rank(left_n: &[f64], left_d: &[f64], node_n: &[f64], node_d: &[f64]) -> f64 {
    let mut numerator = 0.0;
    let mut variance = 0.0;
    for k in 0..node_n.len() {
        let n = node_n[k];
        let d = node_d[k];
        if n < 1.0 || d == 0.0 {
            continue;
        }
        let share = left_n[k] / n;
        numerator += left_d[k] - d * share;
        if n > 1.0 {
            variance += d * share * (1.0 - share) * (n - d) / (n - 1.0);
        }
    }
    if variance <= 0.0 {
        0.0
    } else {
        numerator.abs() / variance.sqrt()
    }
}

impl RandomSurvivalForest {
    pub fn fit<R: AsRef<[f64]>>(
        x: &[R],
        durations: &[f64],
        events: &[bool],
        params: &RsfParams,
    ) -> Self {
        let mut event_times: Vec<f64> = durations
            .iter()
            .zip(events)
            .filter(|&(_, &e)| e)
            .map(|(&d, _)| d)
            .collect();
        event_times.sort_by(|a, b| a.total_cmp(b));
        event_times.dedup();

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees.max(1) {
            let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n.max(1))).collect();
            let mut grower = Grower::new(x, durations, events, &event_times, *params);
            if n > 0 {
                grower.grow(&mut sample, 0, &mut rng);
            }
            trees.push(SurvivalTree {
                nodes: grower.nodes,
            });
        }

        Self { event_times, trees }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Mean cumulative hazard over trees at each event time.
    pub fn cumulative_hazard(&self, row: &[f64]) -> Vec<f64> {
        let mut total = vec![0.0; self.event_times.len()];
        let mut used = 0usize;
        for tree in &self.trees {
            if let Some(h) = tree.leaf_hazard(row) {
                for (acc, v) in total.iter_mut().zip(h) {
                    *acc += v;
                }
                used += 1;
            }
        }
        if used > 0 {
            for acc in total.iter_mut() {
                *acc /= used as f64;
            }
        }
        total
    }

    pub fn survival_curve(&self, row: &[f64]) -> SurvivalCurve {
        SurvivalCurve::from_points(
            self.event_times
                .iter()
                .zip(self.cumulative_hazard(row))
                .map(|(&t, h)| (t, (-h).exp()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<[f64; 2]>, Vec<f64>, Vec<bool>) {
        let mut x = Vec::new();
        let mut t = Vec::new();
        let mut e = Vec::new();
        for i in 0..80 {
            let risky = i % 2 == 0;
            x.push([if risky { 1.0 } else { 0.0 }, (i % 9) as f64]);
            t.push(if risky { 6.0 + (i % 7) as f64 } else { 20.0 + (i % 11) as f64 });
            e.push(i % 5 != 0);
        }
        (x, t, e)
    }

    #[test]
    fn test_log_rank_zero_for_identical_groups() {
        let n = [4.0, 2.0];
        let d = [2.0, 1.0];
        let half_n = [2.0, 1.0];
        let half_d = [1.0, 0.5];
        assert!(log_rank(&half_n, &half_d, &n, &d) < 1e-12);
    }

    #[test]
    fn test_forest_separates_risk_groups() {
        let (x, t, e) = data();
        let params = RsfParams {
            n_trees: 20,
            ..RsfParams::default()
        };
        let forest = RandomSurvivalForest::fit(&x, &t, &e, &params);
        assert_eq!(forest.tree_count(), 20);
        let risky = forest.survival_curve(&[1.0, 3.0]);
        let safe = forest.survival_curve(&[0.0, 3.0]);
        assert!(risky.survival_at(12.0) < safe.survival_at(12.0));
        for w in risky.points().windows(2) {
            assert!(w[1].survival_prob <= w[0].survival_prob);
        }
    }

    #[test]
    fn test_forest_is_seeded() {
        let (x, t, e) = data();
        let params = RsfParams {
            n_trees: 5,
            ..RsfParams::default()
        };
        assert_eq!(
            RandomSurvivalForest::fit(&x, &t, &e, &params),
            RandomSurvivalForest::fit(&x, &t, &e, &params)
        );
    }
}
