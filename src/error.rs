//! Error types for geoprobe
//!
//! This module provides the error handling for the library:
//! - A single crate-level [`Error`] with contextual variants
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Task-level failures (transport errors, missing credentials, renderer
//! failures) never surface through this type to a run's caller: the task
//! executor absorbs them into a classified record. Only run-level failures
//! propagate out of the `start_*` operations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for geoprobe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for geoprobe
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "soax.port_login")
        key: Option<String>,
    },

    /// A run submission was rejected before any state was created
    #[error("invalid run: {0}")]
    Validation(String),

    /// Run identifier is not registered
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Proxy session could not be built
    #[error("session error: {0}")]
    Session(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config file could not be parsed
    #[error("failed to parse {path}: {source}")]
    TomlParse {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },

    /// `.env` file could not be loaded
    #[error("failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    /// External tool execution failed (screenshot command, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not configured)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// API error response format
///
/// ```json
/// {
///   "error": {
///     "code": "run_not_found",
///     "message": "run not found: a1b2c3d4e5f6",
///     "details": { "run_id": "a1b2c3d4e5f6" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "run_not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - invalid input
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            // 404 Not Found
            Error::RunNotFound(_) => 404,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::TomlParse { .. } => 500,
            Error::EnvFile(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - upstream proxy or network failure
            Error::Session(_) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ExternalTool(_) => 503,

            // 501 Not Implemented
            Error::NotSupported(_) => 501,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::RunNotFound(_) => "run_not_found",
            Error::Session(_) => "session_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::TomlParse { .. } => "config_parse_error",
            Error::EnvFile(_) => "env_file_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::RunNotFound(id) => Some(serde_json::json!({ "run_id": id })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::TomlParse { path, .. } => Some(serde_json::json!({ "path": path })),
            _ => None,
        };

        match details {
            Some(details) => ApiError::with_details(code, message, details),
            None => ApiError::new(code, message),
        }
    }
}
