// ⚠️ Error types for the club dashboard library
//
// Hard failures only. Degraded results (store down, not enough history)
// are not errors: they travel as `Outcome::Fallback` / `Outcome::Unavailable`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClubError {
    /// SQLite failure (connection, constraint, query)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV read/write failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Scenario name outside {pessimistic, realistic, optimistic}
    #[error("Unknown scenario '{0}' (expected pessimistic, realistic or optimistic)")]
    InvalidScenario(String),

    /// Caller-supplied value rejected by validation
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Member {0} not found")]
    MemberNotFound(i64),

    #[error("Insufficient data: need {required} rows, have {available}")]
    InsufficientData { required: usize, available: usize },

    /// Regressor could not be trained or queried
    #[error("Model error: {0}")]
    Model(String),
}

impl ClubError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ClubError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ClubError>;
