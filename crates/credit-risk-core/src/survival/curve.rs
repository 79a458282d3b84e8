use serde::{Deserialize, Serialize};

use crate::types::{Months, Probability};

/// Months at which survival is reported.
pub const CHECKPOINT_MONTHS: [Months; 3] = [6.0, 12.0, 24.0];

fn round_to(value: f64, dp: i32) -> f64 {
    let scale = 10f64.powi(dp);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub time: Months,
    pub survival_prob: Probability,
}

/// Survival probability over time: starts at (0, 1.0) and never increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalCurve {
    points: Vec<CurvePoint>,
    /// Taken from the unrounded probabilities.
    median: Option<Months>,
}

impl SurvivalCurve {
    /// Build from raw `(time, probability)` pairs in any order. Negative and
    /// non-finite pairs are dropped, probabilities are clamped to [0, 1] and
    /// forced non-increasing. Times are rounded to 2 dp and probabilities
    /// to 4 dp.
    pub fn from_points(mut raw: Vec<(f64, f64)>) -> Self {
        raw.retain(|(t, p)| t.is_finite() && p.is_finite() && *t >= 0.0);
        raw.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut points: Vec<CurvePoint> = vec![CurvePoint {
            time: 0.0,
            survival_prob: 1.0,
        }];
        let mut floor = 1.0_f64;
        let mut median = None;
        for (t, p) in raw {
            floor = p.clamp(0.0, 1.0).min(floor);
            let time = round_to(t, 2);
            if median.is_none() && floor <= 0.5 {
                median = Some(time);
            }
            let survival_prob = round_to(floor, 4);
            match points.last_mut() {
                Some(last) if last.time == time => last.survival_prob = survival_prob,
                _ => points.push(CurvePoint {
                    time,
                    survival_prob,
                }),
            }
        }
        Self { points, median }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Earliest time with survival at or below one half. `None` means the
    /// curve stays above 0.5 over the observed window.
    pub fn median(&self) -> Option<Months> {
        self.median
    }

    /// Linear interpolation, clamped to the curve's first and last points.
    pub fn survival_at(&self, time: Months) -> Probability {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 1.0;
        };
        if time <= first.time {
            return first.survival_prob;
        }
        if time >= last.time {
            return last.survival_prob;
        }
        let upper = self.points.partition_point(|p| p.time <= time);
        let a = self.points[upper - 1];
        let b = self.points[upper];
        let w = (time - a.time) / (b.time - a.time);
        round_to(a.survival_prob + w * (b.survival_prob - a.survival_prob), 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivalModelKind {
    Cox,
    Rsf,
}

impl SurvivalModelKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cox" => Some(SurvivalModelKind::Cox),
            "rsf" => Some(SurvivalModelKind::Rsf),
            _ => None,
        }
    }
}

/// Risk band over the median time to default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivalRiskTier {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl SurvivalRiskTier {
    pub fn from_median(median: Option<Months>) -> Self {
        match median {
            Some(m) if m < 12.0 => SurvivalRiskTier::VeryHigh,
            Some(m) if m < 18.0 => SurvivalRiskTier::High,
            Some(m) if m < 24.0 => SurvivalRiskTier::Medium,
            _ => SurvivalRiskTier::Low,
        }
    }
}

impl std::fmt::Display for SurvivalRiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurvivalRiskTier::VeryHigh => write!(f, "Very high"),
            SurvivalRiskTier::High => write!(f, "High"),
            SurvivalRiskTier::Medium => write!(f, "Medium"),
            SurvivalRiskTier::Low => write!(f, "Low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalResult {
    pub model: SurvivalModelKind,
    pub survival_curve: Vec<CurvePoint>,
    /// `None` when survival stays above 0.5 for the whole window.
    pub median_time_to_default: Option<Months>,
    pub survival_at_6m: Probability,
    pub survival_at_12m: Probability,
    pub survival_at_24m: Probability,
    pub risk_tier: SurvivalRiskTier,
}

impl SurvivalResult {
    pub fn from_curve(model: SurvivalModelKind, curve: &SurvivalCurve) -> Self {
        let median = curve.median();
        let [m6, m12, m24] = CHECKPOINT_MONTHS;
        Self {
            model,
            survival_curve: curve.points().to_vec(),
            median_time_to_default: median,
            survival_at_6m: curve.survival_at(m6),
            survival_at_12m: curve.survival_at(m12),
            survival_at_24m: curve.survival_at(m24),
            risk_tier: SurvivalRiskTier::from_median(median),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn curve() -> SurvivalCurve {
        SurvivalCurve::from_points(vec![(10.0, 0.8), (20.0, 0.45), (30.0, 0.3)])
    }

    #[test]
    fn test_curve_starts_at_one_and_never_increases() {
        let c = SurvivalCurve::from_points(vec![(5.0, 0.9), (3.0, 0.95), (8.0, 0.97), (9.0, 0.6)]);
        let probs: Vec<f64> = c.points().iter().map(|p| p.survival_prob).collect();
        assert_eq!(probs, vec![1.0, 0.95, 0.9, 0.9, 0.6]);
        assert_eq!(c.points()[0].time, 0.0);
    }

    #[test]
    fn test_median_is_first_at_or_below_half() {
        assert_eq!(curve().median(), Some(20.0));
        let c = SurvivalCurve::from_points(vec![(6.0, 0.5)]);
        assert_eq!(c.median(), Some(6.0));
    }

    #[test]
    fn test_median_ignores_display_rounding() {
        let c = SurvivalCurve::from_points(vec![(10.0, 0.50004), (20.0, 0.4)]);
        assert_eq!(c.points()[1].survival_prob, 0.5);
        assert_eq!(c.median(), Some(20.0));
    }

    #[test]
    fn test_median_none_when_above_half() {
        let c = SurvivalCurve::from_points(vec![(12.0, 0.9), (36.0, 0.7)]);
        assert_eq!(c.median(), None);
        assert_eq!(SurvivalRiskTier::from_median(c.median()), SurvivalRiskTier::Low);
    }

    #[test]
    fn test_interpolation_clamped() {
        let c = curve();
        assert_eq!(c.survival_at(5.0), 0.9);
        assert_eq!(c.survival_at(15.0), 0.625);
        assert_eq!(c.survival_at(40.0), 0.3);
        assert_eq!(c.survival_at(-1.0), 1.0);
    }

    #[test]
    fn test_risk_tiers() {
        assert_eq!(SurvivalRiskTier::from_median(Some(11.99)), SurvivalRiskTier::VeryHigh);
        assert_eq!(SurvivalRiskTier::from_median(Some(12.0)), SurvivalRiskTier::High);
        assert_eq!(SurvivalRiskTier::from_median(Some(18.0)), SurvivalRiskTier::Medium);
        assert_eq!(SurvivalRiskTier::from_median(Some(24.0)), SurvivalRiskTier::Low);
    }

    #[test]
    fn test_result_from_curve() {
        let r = SurvivalResult::from_curve(SurvivalModelKind::Cox, &curve());
        assert_eq!(r.median_time_to_default, Some(20.0));
        assert_eq!(r.risk_tier, SurvivalRiskTier::Medium);
        assert_eq!(r.survival_at_12m, 0.73);
        assert_eq!(r.survival_at_24m, 0.39);
    }
}
