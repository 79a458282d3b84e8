use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::ratios::codes::{NamedRatio, RatioCode, RatioVector, RATIO_COUNT};
use crate::statements::parse::parse_amount;
use crate::statements::{FinancialStatements, StatementKind, StatementTable};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::CreditRiskResult;

/// Factor applied to current values when the prior period is estimated.
pub const ESTIMATED_PRIOR_FACTOR: Decimal = dec!(0.9);

const DAYS_PER_YEAR: Decimal = dec!(365);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How the prior-period value of an averaged line item is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorPeriodStrategy {
    /// Read the second-to-last period column.
    #[default]
    ExtractPriorPeriod,
    /// Use 0.9 x the current value.
    EstimateFromCurrent,
}

impl std::fmt::Display for PriorPeriodStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorPeriodStrategy::ExtractPriorPeriod => write!(f, "extract_prior_period"),
            PriorPeriodStrategy::EstimateFromCurrent => write!(f, "estimate_from_current"),
        }
    }
}

/// A balance-sheet quantity averaged over the two most recent periods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Averaged {
    pub current: Money,
    pub prior: Money,
    pub average: Money,
}

impl Averaged {
    pub fn new(current: Money, prior: Money) -> Self {
        Self {
            current,
            prior,
            average: (current + prior) / dec!(2),
        }
    }
}

/// Line items the ratios are computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseQuantities {
    pub revenue: Money,
    pub gross_profit: Money,
    pub pre_tax_profit: Money,
    pub cost_of_goods_sold: Money,
    pub interest_expense: Money,
    pub depreciation: Money,
    pub total_assets: Averaged,
    pub equity: Averaged,
    pub total_liabilities: Money,
    pub current_assets: Money,
    pub current_liabilities: Money,
    pub inventory: Averaged,
    pub current_portion_long_term_debt: Money,
    pub cash: Money,
    pub receivables: Averaged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioExtraction {
    pub ratios: RatioVector,
    pub named: Vec<NamedRatio>,
    pub base: BaseQuantities,
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

type SearchTerms = &'static [(StatementKind, &'static str)];

const REVENUE: SearchTerms = &[
    (StatementKind::IncomeStatement, "doanh thu thuần"),
    (StatementKind::IncomeStatement, "doanh thu bán"),
];
const GROSS_PROFIT: SearchTerms = &[(StatementKind::IncomeStatement, "lợi nhuận gộp")];
const PRE_TAX_PROFIT: SearchTerms = &[(StatementKind::IncomeStatement, "lợi nhuận trước thuế")];
const COST_OF_GOODS_SOLD: SearchTerms = &[(StatementKind::IncomeStatement, "giá vốn")];
const INTEREST_EXPENSE: SearchTerms = &[
    (StatementKind::IncomeStatement, "lãi vay"),
    (StatementKind::IncomeStatement, "chi phí lãi"),
];
const DEPRECIATION: SearchTerms = &[
    (StatementKind::IncomeStatement, "khấu hao"),
    (StatementKind::CashFlow, "khấu hao"),
];
const TOTAL_ASSETS: SearchTerms = &[(StatementKind::BalanceSheet, "tổng tài sản")];
const EQUITY: SearchTerms = &[(StatementKind::BalanceSheet, "vốn chủ sở hữu")];
const TOTAL_LIABILITIES: SearchTerms = &[
    (StatementKind::BalanceSheet, "nợ phải trả"),
    (StatementKind::BalanceSheet, "tổng nợ"),
];
const CURRENT_ASSETS: SearchTerms = &[(StatementKind::BalanceSheet, "tài sản ngắn hạn")];
const CURRENT_LIABILITIES: SearchTerms = &[(StatementKind::BalanceSheet, "nợ ngắn hạn")];
const INVENTORY: SearchTerms = &[(StatementKind::BalanceSheet, "hàng tồn kho")];
const CURRENT_LTD: SearchTerms = &[(StatementKind::BalanceSheet, "nợ dài hạn đến hạn")];
const CASH: SearchTerms = &[
    (StatementKind::BalanceSheet, "tiền"),
    (StatementKind::BalanceSheet, "tiền và tương đương"),
];
const RECEIVABLES: SearchTerms = &[(StatementKind::BalanceSheet, "phải thu")];

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

enum Lookup {
    Found(Money),
    NoRow,
    EmptyCell,
    Unparseable(String),
}

fn lookup(table: &StatementTable, label: &str, period_offset: usize) -> Lookup {
    let Some(row) = table.find_row(label) else {
        return Lookup::NoRow;
    };
    let Some(column) = table.column_for_offset(period_offset) else {
        return Lookup::EmptyCell;
    };
    let cell = table.cell(row, column);
    if cell.is_empty() {
        return Lookup::EmptyCell;
    }
    match parse_amount(cell) {
        Some(value) => Lookup::Found(value),
        None => Lookup::Unparseable(format!("{cell:?}")),
    }
}

fn describe_miss(table: &StatementTable, label: &str, period_offset: usize, miss: &Lookup) -> String {
    match miss {
        Lookup::NoRow => format!("'{label}' not found in {}", table.name),
        Lookup::EmptyCell => format!(
            "'{label}' in {} has no value at period offset {period_offset}",
            table.name
        ),
        Lookup::Unparseable(raw) => format!(
            "'{label}' in {} has unparseable value {raw} at period offset {period_offset}",
            table.name
        ),
        Lookup::Found(_) => String::new(),
    }
}

/// Value of the first row whose label contains `label`, taken `period_offset`
/// columns back from the most recent period. Misses degrade to zero with a
/// logged warning.
pub fn resolve(table: &StatementTable, label: &str, period_offset: usize) -> Money {
    match lookup(table, label, period_offset) {
        Lookup::Found(value) => {
            debug!(table = %table.name, label, period_offset, %value, "resolved line item");
            value
        }
        miss => {
            warn!("{}; using 0", describe_miss(table, label, period_offset, &miss));
            Decimal::ZERO
        }
    }
}

struct Resolver<'a> {
    statements: &'a FinancialStatements,
    strategy: PriorPeriodStrategy,
    warnings: Vec<String>,
}

impl<'a> Resolver<'a> {
    /// Try each term in order. A found non-zero value wins; a found zero
    /// falls through to the next term. Only a complete miss is reported.
    fn quantity(&mut self, terms: SearchTerms, period_offset: usize) -> Money {
        let mut found_any = false;
        let mut first_miss = None;
        for &(kind, term) in terms {
            let table = self.statements.table(kind);
            match lookup(table, term, period_offset) {
                Lookup::Found(value) if !value.is_zero() => {
                    debug!(table = %table.name, term, period_offset, %value, "resolved line item");
                    return value;
                }
                Lookup::Found(_) => found_any = true,
                miss => {
                    if first_miss.is_none() {
                        first_miss = Some(describe_miss(table, term, period_offset, &miss));
                    }
                }
            }
        }
        if !found_any {
            if let Some(message) = first_miss {
                warn!("{message}; using 0");
                self.warnings.push(format!("{message}; using 0"));
            }
        }
        Decimal::ZERO
    }

    fn averaged(&mut self, terms: SearchTerms) -> Averaged {
        let current = self.quantity(terms, 0);
        let prior = match self.strategy {
            PriorPeriodStrategy::ExtractPriorPeriod => self.quantity(terms, 1),
            PriorPeriodStrategy::EstimateFromCurrent => current * ESTIMATED_PRIOR_FACTOR,
        };
        Averaged::new(current, prior)
    }

    fn base_quantities(&mut self) -> BaseQuantities {
        BaseQuantities {
            revenue: self.quantity(REVENUE, 0),
            gross_profit: self.quantity(GROSS_PROFIT, 0),
            pre_tax_profit: self.quantity(PRE_TAX_PROFIT, 0),
            cost_of_goods_sold: self.quantity(COST_OF_GOODS_SOLD, 0),
            interest_expense: self.quantity(INTEREST_EXPENSE, 0),
            depreciation: self.quantity(DEPRECIATION, 0),
            total_assets: self.averaged(TOTAL_ASSETS),
            equity: self.averaged(EQUITY),
            total_liabilities: self.quantity(TOTAL_LIABILITIES, 0),
            current_assets: self.quantity(CURRENT_ASSETS, 0),
            current_liabilities: self.quantity(CURRENT_LIABILITIES, 0),
            inventory: self.averaged(INVENTORY),
            current_portion_long_term_debt: self.quantity(CURRENT_LTD, 0),
            cash: self.quantity(CASH, 0),
            receivables: self.averaged(RECEIVABLES),
        }
    }
}

// ---------------------------------------------------------------------------
// Ratios
// ---------------------------------------------------------------------------

/// Zero denominator (or overflow) yields zero.
fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// The fourteen ratios from resolved base quantities.
pub fn compute_ratios(q: &BaseQuantities) -> RatioVector {
    let avg_assets = q.total_assets.average;
    let avg_equity = q.equity.average;

    let receivable_days = {
        let receivable_turnover = safe_div(q.revenue, q.receivables.average);
        safe_div(DAYS_PER_YEAR, receivable_turnover)
    };

    let mut values = [Decimal::ZERO; RATIO_COUNT];
    values[RatioCode::X1.index()] = safe_div(q.gross_profit, q.revenue);
    values[RatioCode::X2.index()] = safe_div(q.pre_tax_profit, q.revenue);
    values[RatioCode::X3.index()] = safe_div(q.pre_tax_profit, avg_assets);
    values[RatioCode::X4.index()] = safe_div(q.pre_tax_profit, avg_equity);
    values[RatioCode::X5.index()] = safe_div(q.total_liabilities, q.total_assets.current);
    values[RatioCode::X6.index()] = safe_div(q.total_liabilities, q.equity.current);
    values[RatioCode::X7.index()] = safe_div(q.current_assets, q.current_liabilities);
    values[RatioCode::X8.index()] = safe_div(
        q.current_assets - q.inventory.current,
        q.current_liabilities,
    );
    values[RatioCode::X9.index()] = safe_div(
        q.pre_tax_profit + q.interest_expense,
        q.interest_expense,
    );
    values[RatioCode::X10.index()] = safe_div(
        q.pre_tax_profit + q.interest_expense + q.depreciation,
        q.interest_expense + q.current_portion_long_term_debt,
    );
    values[RatioCode::X11.index()] = safe_div(q.cash, q.equity.current);
    values[RatioCode::X12.index()] = safe_div(q.cost_of_goods_sold, q.inventory.average).abs();
    values[RatioCode::X13.index()] = receivable_days;
    values[RatioCode::X14.index()] = safe_div(q.revenue, avg_assets);

    RatioVector::from_values(values)
}

/// Resolve every line item and compute the ratio vector.
pub fn extract_ratios(
    statements: &FinancialStatements,
    strategy: PriorPeriodStrategy,
) -> CreditRiskResult<ComputationOutput<RatioExtraction>> {
    let start = Instant::now();

    let mut resolver = Resolver {
        statements,
        strategy,
        warnings: Vec::new(),
    };

    if strategy == PriorPeriodStrategy::ExtractPriorPeriod
        && statements.balance_sheet.period_count() < 2
    {
        let message = format!(
            "{} has a single period column; averages use the current period twice",
            statements.balance_sheet.name
        );
        warn!("{message}");
        resolver.warnings.push(message);
    }

    let base = resolver.base_quantities();
    let ratios = compute_ratios(&base);
    let named = ratios.named();

    let assumptions = serde_json::json!({
        "prior_period_strategy": strategy.to_string(),
        "estimated_prior_factor": ESTIMATED_PRIOR_FACTOR.to_string(),
        "rounding_dp": 6,
        "zero_denominator": "ratio reported as 0",
    });

    Ok(with_metadata(
        "Financial ratio extraction from balance sheet, income statement and cash flow",
        &assumptions,
        resolver.warnings,
        start.elapsed().as_micros() as u64,
        RatioExtraction {
            ratios,
            named,
            base,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements::CellValue;
    use pretty_assertions::assert_eq;

    fn cols() -> Vec<String> {
        vec!["2023".into(), "2024".into()]
    }

    fn row(values: [f64; 2]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::Number(*v)).collect()
    }

    fn statements() -> FinancialStatements {
        let balance = StatementTable::new("CDKT", cols())
            .with_row("A. Tài sản ngắn hạn", row([300.0, 400.0]))
            .with_row("I. Tiền và các khoản tương đương tiền", row([40.0, 50.0]))
            .with_row("Các khoản phải thu ngắn hạn", row([80.0, 120.0]))
            .with_row("Hàng tồn kho", row([90.0, 110.0]))
            .with_row("Tổng tài sản", row([900.0, 1000.0]))
            .with_row("Nợ phải trả", row([500.0, 600.0]))
            .with_row("Nợ ngắn hạn", row([180.0, 200.0]))
            .with_row("Nợ dài hạn đến hạn trả", row([20.0, 25.0]))
            .with_row("Vốn chủ sở hữu", row([380.0, 400.0]));
        let income = StatementTable::new("BCTN", cols())
            .with_row("Doanh thu thuần", row([1100.0, 1200.0]))
            .with_row("Giá vốn hàng bán", row([-800.0, -900.0]))
            .with_row("Lợi nhuận gộp", row([300.0, 300.0]))
            .with_row("Chi phí lãi vay", row([10.0, 15.0]))
            .with_row("Lợi nhuận trước thuế", row([40.0, 50.0]));
        let cash = StatementTable::new("LCTT", cols()).with_row("Khấu hao TSCĐ", row([30.0, 35.0]));
        FinancialStatements::new(balance, income, cash).unwrap()
    }

    #[test]
    fn test_resolve_missing_label_is_zero() {
        let t = StatementTable::new("CDKT", cols());
        assert_eq!(resolve(&t, "tổng tài sản", 0), Decimal::ZERO);
    }

    #[test]
    fn test_resolve_unparseable_is_zero() {
        let t = StatementTable::new("CDKT", cols()).with_row("Tiền", vec!["n/a".into(), "x".into()]);
        assert_eq!(resolve(&t, "tiền", 0), Decimal::ZERO);
    }

    #[test]
    fn test_resolve_text_amount_and_offset() {
        let t = StatementTable::new("CDKT", cols())
            .with_row("Tiền", vec!["(1,234.50)".into(), "1.234,50".into()]);
        assert_eq!(resolve(&t, "tiền", 0), dec!(1234.50));
        assert_eq!(resolve(&t, "tiền", 1), dec!(-1234.50));
    }

    #[test]
    fn test_roa_uses_average_assets() {
        let out = extract_ratios(&statements(), PriorPeriodStrategy::ExtractPriorPeriod).unwrap();
        assert_eq!(out.result.ratios.get(RatioCode::X3), dec!(0.052632));
        assert_eq!(out.result.base.total_assets.average, dec!(950));
    }

    #[test]
    fn test_full_ratio_vector() {
        let out = extract_ratios(&statements(), PriorPeriodStrategy::ExtractPriorPeriod).unwrap();
        let r = &out.result.ratios;
        assert_eq!(r.get(RatioCode::X1), dec!(0.25));
        assert_eq!(r.get(RatioCode::X5), dec!(0.6));
        assert_eq!(r.get(RatioCode::X7), dec!(2));
        assert_eq!(r.get(RatioCode::X8), dec!(1.45));
        // (50 + 15) / 15
        assert_eq!(r.get(RatioCode::X9), dec!(4.333333));
        // (50 + 15 + 35) / (15 + 25)
        assert_eq!(r.get(RatioCode::X10), dec!(2.5));
        // cost of goods sold is negative in the statement
        assert_eq!(r.get(RatioCode::X12), dec!(9));
        // 365 / (1200 / 100)
        assert_eq!(r.get(RatioCode::X13), dec!(30.416667));
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn test_depreciation_falls_back_to_cash_flow() {
        let out = extract_ratios(&statements(), PriorPeriodStrategy::ExtractPriorPeriod).unwrap();
        assert_eq!(out.result.base.depreciation, dec!(35));
    }

    #[test]
    fn test_estimated_prior_strategy() {
        let out = extract_ratios(&statements(), PriorPeriodStrategy::EstimateFromCurrent).unwrap();
        assert_eq!(out.result.base.total_assets.prior, dec!(900.0));
        assert_eq!(out.result.base.total_assets.average, dec!(950));
        assert_eq!(out.assumptions["prior_period_strategy"], "estimate_from_current");
    }

    #[test]
    fn test_missing_items_warn_and_zero() {
        let empty = || StatementTable::new("x", cols());
        let fs = FinancialStatements::new(empty(), empty(), empty()).unwrap();
        let out = extract_ratios(&fs, PriorPeriodStrategy::ExtractPriorPeriod).unwrap();
        assert_eq!(out.result.ratios, RatioVector::zeros());
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_receivable_days_zero_when_revenue_zero() {
        let q = BaseQuantities {
            receivables: Averaged::new(dec!(100), dec!(100)),
            ..Default::default()
        };
        assert_eq!(compute_ratios(&q).get(RatioCode::X13), Decimal::ZERO);

        let q = BaseQuantities {
            revenue: dec!(1000),
            ..Default::default()
        };
        assert_eq!(compute_ratios(&q).get(RatioCode::X13), Decimal::ZERO);
    }

    #[test]
    fn test_inventory_turnover_never_negative() {
        let q = BaseQuantities {
            cost_of_goods_sold: dec!(-500),
            inventory: Averaged::new(dec!(100), dec!(150)),
            ..Default::default()
        };
        assert_eq!(compute_ratios(&q).get(RatioCode::X12), dec!(4));
    }

    #[test]
    fn test_single_period_warns() {
        let one = || StatementTable::new("CDKT", vec!["2024".into()]);
        let fs = FinancialStatements::new(
            one().with_row("Tổng tài sản", vec![CellValue::Number(500.0)]),
            one(),
            one(),
        )
        .unwrap();
        let out = extract_ratios(&fs, PriorPeriodStrategy::ExtractPriorPeriod).unwrap();
        assert_eq!(out.result.base.total_assets.average, dec!(500));
        assert!(out.warnings[0].contains("single period"));
    }
}
