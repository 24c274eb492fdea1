use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("question collides with fixed column: {0}")]
    SchemaConflict(String),

    #[error("unknown child: {0}")]
    UnknownChild(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = JournalError> = std::result::Result<T, E>;
