use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    ValidationError(String),
    ConfigError(String),
    SecurityError(String),
    /// Bad credentials, unknown host or unreachable server.
    ConnectionError(String),
    /// Failure talking to the hosted language model.
    ModelError(String),
    /// The database rejected or failed the generated SQL.
    ExecutionError(String),
    NotConnected,
    IoError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppError::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            AppError::ModelError(msg) => write!(f, "Model error: {}", msg),
            AppError::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
            AppError::NotConnected => {
                write!(f, "Not connected: connect to a database before asking questions")
            }
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_category() {
        assert_eq!(
            AppError::ExecutionError("relation \"x\" does not exist".to_string()).to_string(),
            "Execution error: relation \"x\" does not exist"
        );
        assert_eq!(
            AppError::ModelError("API error (429)".to_string()).to_string(),
            "Model error: API error (429)"
        );
        assert!(AppError::NotConnected.to_string().starts_with("Not connected"));
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AppError::IoError(msg) if msg == "gone"));
    }
}
