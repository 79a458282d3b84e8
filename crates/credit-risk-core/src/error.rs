use thiserror::Error;

#[derive(Debug, Error)]
pub enum CreditRiskError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Missing statement table(s): {missing}. A workbook must contain balance_sheet (CDKT), income_statement (BCTN) and cash_flow (LCTT)")]
    MissingStatement { missing: String },

    #[error("Dataset schema error: {0}")]
    DatasetSchema(String),

    #[error("{model} model is not trained. {remedy}")]
    NotTrained { model: String, remedy: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: f64,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CreditRiskError {
    pub(crate) fn not_trained(model: &str) -> Self {
        CreditRiskError::NotTrained {
            model: model.to_string(),
            remedy: "Train it first from a CSV dataset with columns X_1..X_14 and 'default'."
                .to_string(),
        }
    }
}

impl From<serde_json::Error> for CreditRiskError {
    fn from(e: serde_json::Error) -> Self {
        CreditRiskError::SerializationError(e.to_string())
    }
}

impl From<csv::Error> for CreditRiskError {
    fn from(e: csv::Error) -> Self {
        CreditRiskError::DatasetSchema(e.to_string())
    }
}

impl From<std::io::Error> for CreditRiskError {
    fn from(e: std::io::Error) -> Self {
        CreditRiskError::Persistence(e.to_string())
    }
}
