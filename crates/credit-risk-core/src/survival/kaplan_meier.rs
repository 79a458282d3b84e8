use serde::{Deserialize, Serialize};

use crate::survival::curve::SurvivalCurve;
use crate::types::Months;

/// Product-limit estimate of the population survival function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KaplanMeier {
    curve: SurvivalCurve,
}

/// Distinct event times with the number at risk and the number of events,
/// in ascending time order.
fn event_table(durations: &[f64], events: &[bool]) -> Vec<(f64, usize, usize)> {
    let mut order: Vec<usize> = (0..durations.len()).collect();
    order.sort_by(|&a, &b| durations[a].total_cmp(&durations[b]));

    let mut table = Vec::new();
    let mut at_risk = durations.len();
    let mut i = 0;
    while i < order.len() {
        let t = durations[order[i]];
        let mut deaths = 0;
        let mut leaving = 0;
        while i < order.len() && durations[order[i]] == t {
            if events[order[i]] {
                deaths += 1;
            }
            leaving += 1;
            i += 1;
        }
        if deaths > 0 {
            table.push((t, at_risk, deaths));
        }
        at_risk -= leaving;
    }
    table
}

impl KaplanMeier {
    pub fn fit(durations: &[f64], events: &[bool]) -> Self {
        let mut survival = 1.0;
        let points = event_table(durations, events)
            .into_iter()
            .map(|(t, at_risk, deaths)| {
                survival *= 1.0 - deaths as f64 / at_risk as f64;
                (t, survival)
            })
            .collect();
        Self {
            curve: SurvivalCurve::from_points(points),
        }
    }

    pub fn curve(&self) -> &SurvivalCurve {
        &self.curve
    }

    pub fn median(&self) -> Option<Months> {
        self.curve.median()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textbook_example() {
        // 6 subjects, one censored at 3
        let durations = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let events = [true, true, false, true, true, false];
        let km = KaplanMeier::fit(&durations, &events);
        let probs: Vec<f64> = km.curve().points().iter().map(|p| p.survival_prob).collect();
        // 5/6, 4/6, then 4/6 * 2/3, then * 1/2
        assert_eq!(probs, vec![1.0, 0.8333, 0.6667, 0.4444, 0.2222]);
        assert_eq!(km.median(), Some(4.0));
    }

    #[test]
    fn test_all_censored_has_no_median() {
        let km = KaplanMeier::fit(&[36.0, 36.0], &[false, false]);
        assert_eq!(km.median(), None);
        assert_eq!(km.curve().points().len(), 1);
    }

    #[test]
    fn test_tied_events() {
        let table = event_table(&[2.0, 2.0, 5.0, 7.0], &[true, true, false, true]);
        assert_eq!(table, vec![(2.0, 4, 2), (7.0, 1, 1)]);
    }
}
