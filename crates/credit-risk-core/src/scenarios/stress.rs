use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::CreditRiskError;
use crate::ratios::{RatioCode, RatioVector};
use crate::types::*;
use crate::CreditRiskResult;

const HUNDRED: Decimal = dec!(100);

/// Percentage shocks applied to a ratio vector. `-10` means a 10% fall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioShock {
    pub revenue_pct: Rate,
    pub interest_pct: Rate,
    pub roe_pct: Rate,
    pub cr_pct: Rate,
}

impl ScenarioShock {
    pub fn new(revenue_pct: Rate, interest_pct: Rate, roe_pct: Rate, cr_pct: Rate) -> Self {
        Self {
            revenue_pct,
            interest_pct,
            roe_pct,
            cr_pct,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.revenue_pct.is_zero()
            && self.interest_pct.is_zero()
            && self.roe_pct.is_zero()
            && self.cr_pct.is_zero()
    }
}

/// Named macro stress presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPreset {
    Mild,
    Moderate,
    Crisis,
    /// Caller supplies the four shocks.
    Custom,
}

impl ScenarioPreset {
    pub fn name(self) -> &'static str {
        match self {
            ScenarioPreset::Mild => "mild",
            ScenarioPreset::Moderate => "moderate",
            ScenarioPreset::Crisis => "crisis",
            ScenarioPreset::Custom => "custom",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mild" => Some(ScenarioPreset::Mild),
            "moderate" => Some(ScenarioPreset::Moderate),
            "crisis" => Some(ScenarioPreset::Crisis),
            "custom" => Some(ScenarioPreset::Custom),
            _ => None,
        }
    }

    /// Fixed shocks for the named presets; `None` for `Custom`.
    pub fn shock(self) -> Option<ScenarioShock> {
        match self {
            ScenarioPreset::Mild => Some(ScenarioShock::new(dec!(-5), dec!(5), dec!(-5), dec!(-5))),
            ScenarioPreset::Moderate => Some(ScenarioShock::new(
                dec!(-10),
                dec!(10),
                dec!(-10),
                dec!(-8),
            )),
            ScenarioPreset::Crisis => Some(ScenarioShock::new(
                dec!(-20),
                dec!(15),
                dec!(-20),
                dec!(-12),
            )),
            ScenarioPreset::Custom => None,
        }
    }
}

/// Shock for a preset, taking `custom` when the preset is `Custom`.
pub fn shock_for(
    preset: ScenarioPreset,
    custom: Option<ScenarioShock>,
) -> CreditRiskResult<ScenarioShock> {
    match (preset.shock(), custom) {
        (Some(shock), _) => Ok(shock),
        (None, Some(shock)) => Ok(shock),
        (None, None) => Err(CreditRiskError::InvalidInput {
            field: "scenario".into(),
            reason: "A custom scenario needs revenue, interest, roe and cr shocks".into(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

fn factor(pct: Rate) -> Decimal {
    Decimal::ONE + pct / HUNDRED
}

fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// Apply a shock to a ratio vector.
///
/// Costs are held fixed while revenue scales by `r`, so margins move as
/// `(m + r - 1) / r`, ROA picks up `(r - 1)` times asset turnover, asset
/// turnover scales by `r` and receivable days by `1 / r`. Both coverage ratios
/// divide by `i`, ROE scales by `1 + roe_pct/100` and the current and quick
/// ratios by `1 + cr_pct/100`. Leverage, cash-to-equity and inventory turnover
/// are copied.
pub fn simulate(base: &RatioVector, shock: &ScenarioShock) -> RatioVector {
    let r = factor(shock.revenue_pct);
    let i = factor(shock.interest_pct);
    let roe = factor(shock.roe_pct);
    let cr = factor(shock.cr_pct);
    let growth = r - Decimal::ONE;

    let mut out = base.clone();
    let get = |code| base.get(code);

    out.set(RatioCode::X1, safe_div(get(RatioCode::X1) + growth, r));
    out.set(RatioCode::X2, safe_div(get(RatioCode::X2) + growth, r));
    out.set(
        RatioCode::X3,
        get(RatioCode::X3) + growth * get(RatioCode::X14),
    );
    out.set(RatioCode::X4, get(RatioCode::X4) * roe);
    out.set(RatioCode::X7, get(RatioCode::X7) * cr);
    out.set(RatioCode::X8, get(RatioCode::X8) * cr);
    out.set(RatioCode::X9, safe_div(get(RatioCode::X9), i));
    out.set(RatioCode::X10, safe_div(get(RatioCode::X10), i));
    out.set(RatioCode::X13, safe_div(get(RatioCode::X13), r));
    out.set(RatioCode::X14, get(RatioCode::X14) * r);
    out
}

/// Positional form of [`simulate`].
pub fn simulate_scenario(
    base: &RatioVector,
    revenue_pct: Rate,
    interest_pct: Rate,
    roe_pct: Rate,
    cr_pct: Rate,
) -> RatioVector {
    simulate(
        base,
        &ScenarioShock::new(revenue_pct, interest_pct, roe_pct, cr_pct),
    )
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioShift {
    pub code: RatioCode,
    pub before: Decimal,
    pub after: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressResult {
    pub scenario: ScenarioPreset,
    pub shock: ScenarioShock,
    pub base_ratios: RatioVector,
    pub stressed_ratios: RatioVector,
    /// Ratios whose value moved.
    pub shifts: Vec<RatioShift>,
}

/// Run a preset (or custom) scenario and report the moved ratios.
pub fn run_stress(
    base: &RatioVector,
    preset: ScenarioPreset,
    custom: Option<ScenarioShock>,
) -> CreditRiskResult<ComputationOutput<StressResult>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let shock = shock_for(preset, custom)?;
    if shock.revenue_pct <= -HUNDRED {
        warnings.push(format!(
            "Revenue shock of {}% removes all revenue; revenue-linked ratios set to 0",
            shock.revenue_pct
        ));
    }

    let stressed = simulate(base, &shock);
    let shifts = base
        .iter()
        .zip(stressed.iter())
        .filter(|((_, before), (_, after))| before != after)
        .map(|((code, before), (_, after))| RatioShift {
            code,
            before,
            after,
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Ratio stress test under a fixed-cost revenue shock",
        &serde_json::json!({
            "scenario": preset.name(),
            "revenue_pct": shock.revenue_pct.to_string(),
            "interest_pct": shock.interest_pct.to_string(),
            "roe_pct": shock.roe_pct.to_string(),
            "cr_pct": shock.cr_pct.to_string(),
        }),
        warnings,
        elapsed,
        StressResult {
            scenario: preset,
            shock,
            base_ratios: base.clone(),
            stressed_ratios: stressed,
            shifts,
        },
    ))
}

/// Default probability before and after a stress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdChange {
    pub before: Probability,
    pub after: Probability,
    /// Relative change in percent, 2 dp. Zero when `before` is zero.
    pub change_pct: f64,
    /// Absolute change, 6 dp.
    pub change_absolute: f64,
}

fn round_to(value: f64, dp: i32) -> f64 {
    let scale = 10f64.powi(dp);
    (value * scale).round() / scale
}

impl PdChange {
    pub fn between(before: Probability, after: Probability) -> Self {
        let change_pct = if before == 0.0 {
            0.0
        } else {
            round_to((after - before) / before * 100.0, 2)
        };
        Self {
            before,
            after,
            change_pct,
            change_absolute: round_to(after - before, 6),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> RatioVector {
        RatioVector::from_values([
            dec!(0.25),
            dec!(0.05),
            dec!(0.06),
            dec!(0.15),
            dec!(0.6),
            dec!(1.5),
            dec!(1.8),
            dec!(1.2),
            dec!(4.0),
            dec!(2.5),
            dec!(0.12),
            dec!(8.0),
            dec!(45.0),
            dec!(1.2),
        ])
    }

    #[test]
    fn test_zero_shock_is_identity() {
        let b = base();
        assert_eq!(simulate(&b, &ScenarioShock::default()), b);
        assert_eq!(
            simulate_scenario(&b, dec!(0), dec!(0), dec!(0), dec!(0)),
            b
        );
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let shock = ScenarioPreset::Crisis.shock().unwrap();
        assert_eq!(simulate(&base(), &shock), simulate(&base(), &shock));
    }

    #[test]
    fn test_revenue_drop_with_fixed_costs() {
        let out = simulate_scenario(&base(), dec!(-10), dec!(0), dec!(0), dec!(0));
        // (0.25 - 0.1) / 0.9
        assert_eq!(out.get(RatioCode::X1), dec!(0.166667));
        // 0.06 - 0.1 * 1.2
        assert_eq!(out.get(RatioCode::X3), dec!(-0.06));
        assert_eq!(out.get(RatioCode::X14), dec!(1.08));
        assert_eq!(out.get(RatioCode::X13), dec!(50));
        assert_eq!(out.get(RatioCode::X5), dec!(0.6));
    }

    #[test]
    fn test_interest_shock_lowers_coverage() {
        let out = simulate_scenario(&base(), dec!(0), dec!(25), dec!(0), dec!(0));
        assert_eq!(out.get(RatioCode::X9), dec!(3.2));
        assert_eq!(out.get(RatioCode::X10), dec!(2));
    }

    #[test]
    fn test_roe_and_liquidity_shocks() {
        let out = simulate_scenario(&base(), dec!(0), dec!(0), dec!(-20), dec!(-10));
        assert_eq!(out.get(RatioCode::X4), dec!(0.12));
        assert_eq!(out.get(RatioCode::X7), dec!(1.62));
        assert_eq!(out.get(RatioCode::X8), dec!(1.08));
    }

    #[test]
    fn test_total_revenue_loss_does_not_divide_by_zero() {
        let out = simulate_scenario(&base(), dec!(-100), dec!(0), dec!(0), dec!(0));
        assert_eq!(out.get(RatioCode::X1), Decimal::ZERO);
        assert_eq!(out.get(RatioCode::X13), Decimal::ZERO);
        assert_eq!(out.get(RatioCode::X14), Decimal::ZERO);
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            ScenarioPreset::Moderate.shock(),
            Some(ScenarioShock::new(dec!(-10), dec!(10), dec!(-10), dec!(-8)))
        );
        assert_eq!(ScenarioPreset::from_name("CRISIS"), Some(ScenarioPreset::Crisis));
        assert!(shock_for(ScenarioPreset::Custom, None).is_err());
        let custom = ScenarioShock::new(dec!(1), dec!(2), dec!(3), dec!(4));
        assert_eq!(shock_for(ScenarioPreset::Custom, Some(custom)).unwrap(), custom);
        // named presets ignore a supplied custom shock
        assert_eq!(
            shock_for(ScenarioPreset::Mild, Some(custom)).unwrap(),
            ScenarioPreset::Mild.shock().unwrap()
        );
    }

    #[test]
    fn test_run_stress_reports_shifts() {
        let out = run_stress(&base(), ScenarioPreset::Mild, None).unwrap();
        let moved: Vec<RatioCode> = out.result.shifts.iter().map(|s| s.code).collect();
        assert!(moved.contains(&RatioCode::X1));
        assert!(!moved.contains(&RatioCode::X5));
        assert!(!moved.contains(&RatioCode::X12));
        assert_eq!(out.assumptions["scenario"], "mild");
    }

    #[test]
    fn test_pd_change() {
        let c = PdChange::between(0.04, 0.05);
        assert_eq!(c.change_pct, 25.0);
        assert_eq!(c.change_absolute, 0.01);
        assert_eq!(PdChange::between(0.0, 0.3).change_pct, 0.0);
    }
}
