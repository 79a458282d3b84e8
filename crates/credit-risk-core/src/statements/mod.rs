pub mod ingest;
pub mod parse;
pub mod table;

pub use ingest::statements_from_upload;
pub use table::{
    CellValue, FinancialStatements, StatementKind, StatementRow, StatementTable, Workbook,
};
