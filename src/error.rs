//! Domain-specific error types for casekit

use thiserror::Error;

/// Main error type for the casekit notebooklet framework
#[derive(Error, Debug)]
pub enum CasekitError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required parameter: {name}")]
    MissingParameter { name: String },

    #[error("Invalid option(s): {message}")]
    InvalidOption { message: String },

    #[error("Required data provider(s) not loaded: {requirement}")]
    MissingProvider { requirement: String },

    #[error("Provider error: {message}")]
    Provider { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CasekitError {
    /// Missing-parameter constructor used by notebooklet `run` validation
    pub fn missing_param(name: impl Into<String>) -> Self {
        CasekitError::MissingParameter { name: name.into() }
    }
}

impl From<anyhow::Error> for CasekitError {
    fn from(err: anyhow::Error) -> Self {
        CasekitError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CasekitError {
    fn from(err: serde_json::Error) -> Self {
        CasekitError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for CasekitError {
    fn from(err: serde_yaml::Error) -> Self {
        CasekitError::Config {
            message: format!("metadata document parse failed: {}", err),
        }
    }
}

impl From<csv::Error> for CasekitError {
    fn from(err: csv::Error) -> Self {
        CasekitError::Provider {
            message: format!("CSV read failed: {}", err),
        }
    }
}

impl From<chrono::ParseError> for CasekitError {
    fn from(err: chrono::ParseError) -> Self {
        CasekitError::Config {
            message: format!("Date parsing error: {}", err),
        }
    }
}

/// Result type alias for casekit operations
pub type Result<T> = std::result::Result<T, CasekitError>;
