use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Required column '{column}' not found")]
    MissingColumn { column: String },

    #[error("Invalid row at line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
