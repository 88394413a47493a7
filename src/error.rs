use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("ambiguous attribute: {0}")]
    AmbiguousAttribute(String),

    #[error("unknown statistics: {0}")]
    UnknownStatistics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for OptimizerError {
    fn from(e: serde_json::Error) -> Self {
        OptimizerError::Internal(format!("statistics file: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
