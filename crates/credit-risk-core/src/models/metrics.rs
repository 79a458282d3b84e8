use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub samples: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
}

impl ClassificationMetrics {
    /// Metrics for scores against 0/1 labels at `threshold`.
    pub fn evaluate(labels: &[bool], scores: &[f64], threshold: f64) -> Self {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut tn = 0usize;
        let mut fn_ = 0usize;
        for (&actual, &score) in labels.iter().zip(scores) {
            match (actual, score >= threshold) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            samples: labels.len(),
            accuracy: ratio(tp + tn, labels.len()),
            precision,
            recall,
            f1,
            auc: roc_auc(labels, scores),
        }
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged.
/// Returns 0.5 when only one class is present.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> f64 {
    let n = labels.len().min(scores.len());
    let positives = labels[..n].iter().filter(|&&l| l).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; tied block shares the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            if labels[k] {
                rank_sum += mean_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    (rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

/// Harrell's concordance index. A pair is comparable when the earlier time
/// is an observed event; higher risk should fail first.
pub fn concordance_index(times: &[f64], events: &[bool], risks: &[f64]) -> f64 {
    let n = times.len();
    let mut concordant = 0.0;
    let mut comparable = 0.0;
    for i in 0..n {
        if !events[i] {
            continue;
        }
        for j in 0..n {
            if times[i] < times[j] {
                comparable += 1.0;
                if risks[i] > risks[j] {
                    concordant += 1.0;
                } else if risks[i] == risks[j] {
                    concordant += 0.5;
                }
            }
        }
    }
    if comparable == 0.0 {
        0.5
    } else {
        concordant / comparable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_ranking() {
        let labels = [false, false, true, true];
        let scores = [0.1, 0.2, 0.8, 0.9];
        assert_eq!(roc_auc(&labels, &scores), 1.0);
        let m = ClassificationMetrics::evaluate(&labels, &scores, 0.5);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.samples, 4);
    }

    #[test]
    fn test_ties_count_half() {
        let labels = [false, true];
        let scores = [0.5, 0.5];
        assert_eq!(roc_auc(&labels, &scores), 0.5);
    }

    #[test]
    fn test_single_class_auc() {
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.9]), 0.5);
    }

    #[test]
    fn test_precision_recall() {
        let labels = [true, true, false, false];
        let scores = [0.9, 0.2, 0.7, 0.1];
        let m = ClassificationMetrics::evaluate(&labels, &scores, 0.5);
        assert_eq!(m.precision, 0.5);
        assert_eq!(m.recall, 0.5);
        assert_eq!(m.accuracy, 0.5);
    }

    #[test]
    fn test_concordance() {
        let times = [2.0, 4.0, 6.0];
        let events = [true, true, false];
        assert_eq!(concordance_index(&times, &events, &[3.0, 2.0, 1.0]), 1.0);
        assert_eq!(concordance_index(&times, &events, &[1.0, 2.0, 3.0]), 0.0);
    }
}
