//! Service error types
//!
//! Every error that can reach a client is mapped to an HTTP status code and
//! a sanitized detail string. Secrets and sensitive paths are redacted before
//! a message leaves the process.

use thiserror::Error;
use warp::http::StatusCode;

/// Main error type for chat service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Server credentials are not configured")]
    CredentialsNotConfigured,

    #[error("LLM provider error: {0}")]
    LlmError(#[from] crate::llm::provider::LlmError),

    #[error("Tool error: {0}")]
    ToolError(#[from] crate::tools::ToolError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ServiceError {
    /// Create an unauthorized error
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// HTTP status code this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ServiceError::CredentialsNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::LlmError(_)
            | ServiceError::ToolError(_)
            | ServiceError::ConfigError(_)
            | ServiceError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing detail string, sanitized
    pub fn detail(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

impl warp::reject::Reject for ServiceError {}

/// Sanitize error messages to prevent sensitive data leakage
pub fn sanitize_error_message(message: &str) -> String {
    // Remove common secret patterns
    let mut sanitized = regex::Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+")
        .unwrap()
        .replace_all(message, "${1}=***")
        .to_string();

    // Remove potential file paths that might contain sensitive info
    sanitized =
        regex::Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
            .unwrap()
            .replace_all(&sanitized, "/***REDACTED***/")
            .to_string();

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut max_content_len = 500 - truncate_suffix.len();
        // Back off to a char boundary; vendor error text can be non-ASCII
        while !sanitized.is_char_boundary(max_content_len) {
            max_content_len -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..max_content_len], truncate_suffix);
    }

    sanitized
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
