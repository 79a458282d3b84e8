//! Staging of uploaded statement workbooks.
//!
//! Uploads are written to a temporary file before parsing. The file is owned
//! by [`StagedUpload`] and removed when it drops, so every exit path (parse
//! error, validation error, success) cleans up after itself.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::CreditRiskError;
use crate::statements::table::{FinancialStatements, Workbook};
use crate::CreditRiskResult;

pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Stage upload bytes in the system temp directory.
pub fn stage_upload(bytes: &[u8], suffix: &str) -> CreditRiskResult<StagedUpload> {
    stage_upload_in(&std::env::temp_dir(), bytes, suffix)
}

/// Stage upload bytes in `dir`.
pub fn stage_upload_in(dir: &Path, bytes: &[u8], suffix: &str) -> CreditRiskResult<StagedUpload> {
    let mut file = tempfile::Builder::new()
        .prefix("statement-upload-")
        .suffix(suffix)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(StagedUpload { file })
}

/// Read a JSON workbook from disk.
pub fn read_workbook(path: &Path) -> CreditRiskResult<Workbook> {
    let contents = fs::read_to_string(path).map_err(|e| CreditRiskError::InvalidInput {
        field: "workbook".into(),
        reason: format!("Failed to read '{}': {e}", path.display()),
    })?;
    serde_json::from_str(&contents).map_err(|e| CreditRiskError::InvalidInput {
        field: "workbook".into(),
        reason: format!("Failed to parse '{}': {e}", path.display()),
    })
}

/// Stage, parse and validate an uploaded workbook in one step.
pub fn statements_from_upload(bytes: &[u8]) -> CreditRiskResult<FinancialStatements> {
    let staged = stage_upload(bytes, ".json")?;
    let workbook = read_workbook(staged.path())?;
    FinancialStatements::from_workbook(workbook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WORKBOOK: &str = r#"{
        "tables": [
            {"name": "CDKT", "columns": ["2024"], "rows": [{"label": "Tổng tài sản", "values": [100]}]},
            {"name": "BCTN", "columns": ["2024"], "rows": []},
            {"name": "LCTT", "columns": ["2024"], "rows": []}
        ]
    }"#;

    fn dir_is_empty(dir: &TempDir) -> bool {
        fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[test]
    fn test_staged_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let staged = stage_upload_in(dir.path(), b"{}", ".json").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
        assert!(dir_is_empty(&dir));
    }

    #[test]
    fn test_staged_file_removed_after_parse_failure() {
        let dir = TempDir::new().unwrap();
        let result = (|| -> CreditRiskResult<Workbook> {
            let staged = stage_upload_in(dir.path(), b"not json", ".json")?;
            read_workbook(staged.path())
        })();
        assert!(result.is_err());
        assert!(dir_is_empty(&dir));
    }

    #[test]
    fn test_statements_from_upload() {
        let statements = statements_from_upload(WORKBOOK.as_bytes()).unwrap();
        assert_eq!(statements.balance_sheet.rows.len(), 1);
    }

    #[test]
    fn test_upload_missing_sheet_is_structural_error() {
        let bytes = br#"{"tables": [{"name": "CDKT", "columns": ["2024"], "rows": []}]}"#;
        let err = statements_from_upload(bytes).unwrap_err();
        assert!(matches!(err, CreditRiskError::MissingStatement { .. }));
    }
}
