use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

// Use anyhow::Result for configuration and startup plumbing
// Use thiserror for errors that reach a caller with a status code

/// Errors surfaced by the proxy handlers and the job poller
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Provider error: {message}")]
    ProviderError {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request validation failed: {0}")]
    ValidationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Polling timed out after {elapsed_secs}s")]
    PollingTimeout { elapsed_secs: u64 },
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn provider_not_found(msg: impl Into<String>) -> Self {
        Self::ProviderNotFound(msg.into())
    }

    pub fn provider_error(status: u16, message: impl Into<String>) -> Self {
        Self::ProviderError {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn provider_error_with_details(status: u16, message: impl Into<String>, details: Value) -> Self {
        Self::ProviderError {
            status,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalServerError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Missing provider credential
    pub fn missing_credential(provider: &str, env_var: &str) -> Self {
        Self::ConfigError(format!(
            "{} API key is not configured (set {})",
            provider, env_var
        ))
    }

    /// Rebuild an error from a serialized `{ message, type, details }` envelope
    pub fn from_envelope(status: u16, kind: &str, message: String, details: Option<Value>) -> Self {
        match kind {
            "invalid_request_error" => Self::BadRequest(message),
            "not_found" => Self::ProviderNotFound(message),
            "internal_error" => Self::InternalServerError(message),
            "config_error" => Self::ConfigError(message),
            "validation_error" => Self::ValidationError(message),
            "network_error" => Self::NetworkError(message),
            _ => Self::ProviderError { status, message, details },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProviderError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::InternalServerError(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NetworkError(_) => StatusCode::BAD_GATEWAY,
            AppError::PollingTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Stable machine-readable error kind, echoed in the `type` field
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "invalid_request_error",
            AppError::ProviderNotFound(_) => "not_found",
            AppError::ProviderError { .. } => "provider_error",
            AppError::InternalServerError(_) => "internal_error",
            AppError::ConfigError(_) => "config_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::NetworkError(_) => "network_error",
            AppError::PollingTimeout { .. } => "polling_timeout",
        }
    }

    /// Human-readable message without the variant prefix
    pub fn message(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::ProviderNotFound(msg)
            | AppError::InternalServerError(msg)
            | AppError::ConfigError(msg)
            | AppError::ValidationError(msg)
            | AppError::NetworkError(msg) => msg.clone(),
            AppError::ProviderError { message, .. } => message.clone(),
            AppError::PollingTimeout { .. } => self.to_string(),
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut error = json!({
            "message": self.message(),
            "type": self.error_type(),
        });
        if let AppError::ProviderError { details: Some(details), .. } = &self {
            error["details"] = details.clone();
        }

        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}

/// Convert from anyhow::Error to AppError for error context
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the full error chain for debugging
        tracing::error!("Application error: {:?}", err);
        AppError::InternalServerError(err.to_string())
    }
}

/// Transport-level failures talking to a provider or to the proxy
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::NetworkError(format!("Request timed out: {}", err))
        } else if err.is_decode() {
            AppError::ProviderError {
                status: 502,
                message: format!("Failed to decode provider response: {}", err),
                details: None,
            }
        } else {
            AppError::NetworkError(err.to_string())
        }
    }
}

/// Helper type for results that use AppError
pub type AppResult<T> = Result<T, AppError>;

/// Helper type for results that use anyhow for internal operations
pub type AnyhowResult<T> = anyhow::Result<T>;
