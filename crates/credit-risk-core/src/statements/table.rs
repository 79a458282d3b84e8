//! Semi-structured statement tables.
//!
//! A table is a list of rows keyed by a free-text line-item label, with one
//! value per period column. Columns run chronologically: the last column is
//! the current period, the one before it the prior period.

use serde::{Deserialize, Serialize};

use crate::error::CreditRiskError;
use crate::statements::parse::normalize_label;
use crate::CreditRiskResult;

// ---------------------------------------------------------------------------
// Cells and rows
// ---------------------------------------------------------------------------

/// A raw cell as it arrives from the ingestion layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(v) => v.is_nan(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

/// One line item with its per-period values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub label: String,
    #[serde(default)]
    pub values: Vec<CellValue>,
}

// ---------------------------------------------------------------------------
// Statement kinds
// ---------------------------------------------------------------------------

/// The three statements a workbook must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
}

impl StatementKind {
    pub const ALL: [StatementKind; 3] = [
        StatementKind::BalanceSheet,
        StatementKind::IncomeStatement,
        StatementKind::CashFlow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "balance_sheet",
            StatementKind::IncomeStatement => "income_statement",
            StatementKind::CashFlow => "cash_flow",
        }
    }

    /// Sheet code used by Vietnamese statement templates.
    pub fn sheet_code(self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "CDKT",
            StatementKind::IncomeStatement => "BCTN",
            StatementKind::CashFlow => "LCTT",
        }
    }

    /// Match a table name against the canonical name or the sheet code.
    pub fn from_table_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        Self::ALL.into_iter().find(|kind| {
            trimmed.eq_ignore_ascii_case(kind.name())
                || trimmed.eq_ignore_ascii_case(kind.sheet_code())
        })
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.sheet_code())
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    pub name: String,
    /// Period labels, earliest first.
    pub columns: Vec<String>,
    pub rows: Vec<StatementRow>,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl StatementTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Builder used by ingestion adapters and tests.
    pub fn with_row(mut self, label: impl Into<String>, values: Vec<CellValue>) -> Self {
        self.rows.push(StatementRow {
            label: label.into(),
            values,
        });
        self
    }

    pub fn period_count(&self) -> usize {
        self.columns.len()
    }

    pub fn validate(&self) -> CreditRiskResult<()> {
        if self.columns.is_empty() {
            return Err(CreditRiskError::InvalidInput {
                field: format!("{}.columns", self.name),
                reason: "A statement table needs at least one period column.".into(),
            });
        }
        Ok(())
    }

    /// Column index for a period counted back from the most recent one.
    /// Offsets past the first column fall back to the last column.
    pub fn column_for_offset(&self, period_offset: usize) -> Option<usize> {
        let n = self.period_count();
        if n == 0 {
            return None;
        }
        if period_offset < n {
            Some(n - 1 - period_offset)
        } else {
            Some(n - 1)
        }
    }

    /// First row, in table order, whose normalized label contains the
    /// normalized search term.
    pub fn find_row(&self, search_term: &str) -> Option<&StatementRow> {
        let needle = normalize_label(search_term);
        if needle.is_empty() {
            return None;
        }
        self.rows
            .iter()
            .find(|row| normalize_label(&row.label).contains(&needle))
    }

    pub fn cell<'a>(&self, row: &'a StatementRow, column: usize) -> &'a CellValue {
        row.values.get(column).unwrap_or(&EMPTY_CELL)
    }
}

// ---------------------------------------------------------------------------
// Workbook
// ---------------------------------------------------------------------------

/// Raw workbook as delivered by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub tables: Vec<StatementTable>,
}

/// The three validated statements used by ratio extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub balance_sheet: StatementTable,
    pub income_statement: StatementTable,
    pub cash_flow: StatementTable,
}

impl FinancialStatements {
    pub fn new(
        balance_sheet: StatementTable,
        income_statement: StatementTable,
        cash_flow: StatementTable,
    ) -> CreditRiskResult<Self> {
        let statements = Self {
            balance_sheet,
            income_statement,
            cash_flow,
        };
        for kind in StatementKind::ALL {
            statements.table(kind).validate()?;
        }
        Ok(statements)
    }

    /// Pick the three required tables out of a workbook. Extra tables are
    /// ignored; any missing table fails the whole workbook.
    pub fn from_workbook(workbook: Workbook) -> CreditRiskResult<Self> {
        let mut balance_sheet = None;
        let mut income_statement = None;
        let mut cash_flow = None;

        for table in workbook.tables {
            match StatementKind::from_table_name(&table.name) {
                Some(StatementKind::BalanceSheet) if balance_sheet.is_none() => {
                    balance_sheet = Some(table)
                }
                Some(StatementKind::IncomeStatement) if income_statement.is_none() => {
                    income_statement = Some(table)
                }
                Some(StatementKind::CashFlow) if cash_flow.is_none() => cash_flow = Some(table),
                _ => {}
            }
        }

        match (balance_sheet, income_statement, cash_flow) {
            (Some(bs), Some(is), Some(cf)) => Self::new(bs, is, cf),
            (bs, is, cf) => {
                let missing: Vec<String> = [
                    (bs.is_none(), StatementKind::BalanceSheet),
                    (is.is_none(), StatementKind::IncomeStatement),
                    (cf.is_none(), StatementKind::CashFlow),
                ]
                .into_iter()
                .filter(|(absent, _)| *absent)
                .map(|(_, kind)| kind.to_string())
                .collect();
                Err(CreditRiskError::MissingStatement {
                    missing: missing.join(", "),
                })
            }
        }
    }

    pub fn table(&self, kind: StatementKind) -> &StatementTable {
        match kind {
            StatementKind::BalanceSheet => &self.balance_sheet,
            StatementKind::IncomeStatement => &self.income_statement,
            StatementKind::CashFlow => &self.cash_flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> StatementTable {
        StatementTable::new(name, vec!["2023".into(), "2024".into()])
            .with_row("1. Tiền", vec![10.0.into(), 20.0.into()])
    }

    #[test]
    fn test_offset_zero_is_last_column() {
        let t = table("CDKT");
        assert_eq!(t.column_for_offset(0), Some(1));
        assert_eq!(t.column_for_offset(1), Some(0));
    }

    #[test]
    fn test_offset_past_first_column_falls_back_to_last() {
        let t = StatementTable::new("CDKT", vec!["2024".into()]);
        assert_eq!(t.column_for_offset(1), Some(0));
        assert_eq!(t.column_for_offset(5), Some(0));
    }

    #[test]
    fn test_missing_cell_reads_empty() {
        let t = StatementTable::new("BCTN", vec!["2023".into(), "2024".into()])
            .with_row("Doanh thu", vec![5.0.into()]);
        let row = t.find_row("doanh thu").unwrap();
        assert_eq!(t.cell(row, 1), &CellValue::Empty);
    }

    #[test]
    fn test_find_row_strips_ordinal_and_case() {
        let t = table("CDKT");
        assert!(t.find_row("TIỀN").is_some());
        assert!(t.find_row("2. tiền").is_some());
    }

    #[test]
    fn test_sheet_codes_and_names_accepted() {
        assert_eq!(
            StatementKind::from_table_name("cdkt"),
            Some(StatementKind::BalanceSheet)
        );
        assert_eq!(
            StatementKind::from_table_name("income_statement"),
            Some(StatementKind::IncomeStatement)
        );
        assert_eq!(StatementKind::from_table_name("notes"), None);
    }

    #[test]
    fn test_workbook_missing_tables_named_in_error() {
        let wb = Workbook {
            tables: vec![table("CDKT")],
        };
        match FinancialStatements::from_workbook(wb) {
            Err(CreditRiskError::MissingStatement { missing }) => {
                assert_eq!(missing, "income_statement (BCTN), cash_flow (LCTT)");
            }
            other => panic!("expected MissingStatement, got {other:?}"),
        }
    }

    #[test]
    fn test_workbook_with_all_tables() {
        let wb = Workbook {
            tables: vec![table("BCTN"), table("notes"), table("LCTT"), table("CDKT")],
        };
        let fs = FinancialStatements::from_workbook(wb).unwrap();
        assert_eq!(fs.balance_sheet.name, "CDKT");
        assert_eq!(fs.cash_flow.name, "LCTT");
    }

    #[test]
    fn test_table_without_columns_rejected() {
        let empty = StatementTable::new("CDKT", vec![]);
        let err = FinancialStatements::new(empty, table("BCTN"), table("LCTT"));
        assert!(err.is_err());
    }

    #[test]
    fn test_cells_deserialize_untagged() {
        let row: StatementRow =
            serde_json::from_str(r#"{"label": "Tiền", "values": [1.5, "(2,000)", null]}"#)
                .unwrap();
        assert_eq!(row.values[0], CellValue::Number(1.5));
        assert_eq!(row.values[1], CellValue::Text("(2,000)".into()));
        assert_eq!(row.values[2], CellValue::Empty);
    }
}
