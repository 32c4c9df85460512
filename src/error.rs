use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by Supernet operations.
///
/// A closed taxonomy: every failure the wrapper can raise is one of these
/// variants, each with a stable machine-readable [`code`](Self::code) and,
/// where applicable, an HTTP-style [`status_code`](Self::status_code).
#[derive(Error, Debug)]
pub enum SupernetError {
    /// Could not reach or handshake with the Supernet.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Login was rejected (bad credentials, expired session).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A project failed for a reason other than a timeout.
    #[error("Project failed: {message}")]
    Project { message: String },

    /// Timed out waiting for an operation to complete.
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The account balance cannot cover the requested generation.
    #[error("Insufficient balance: {message}")]
    InsufficientBalance { message: String },

    /// A client or project configuration field was out of range.
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The wrapper itself was misconfigured.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// The requested model is not offered on the Supernet.
    #[error("Model not found: {model_id}")]
    ModelNotFound { model_id: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A foreign failure that does not fit the taxonomy.
    #[error("{message}")]
    Unknown { message: String },
}

impl SupernetError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            SupernetError::Connection { .. } => "connection_error",
            SupernetError::Authentication { .. } => "authentication_error",
            SupernetError::Project { .. } => "project_error",
            SupernetError::Timeout { .. } => "timeout_error",
            SupernetError::InsufficientBalance { .. } => "insufficient_balance",
            SupernetError::Validation { .. } => "validation_error",
            SupernetError::Configuration { .. } => "configuration_error",
            SupernetError::ModelNotFound { .. } => "model_not_found",
            SupernetError::Network { .. } => "network_error",
            SupernetError::Json(_) => "json_error",
            SupernetError::Unknown { .. } => "unknown_error",
        }
    }

    /// HTTP-style status code, where one applies.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SupernetError::Authentication { .. } => Some(401),
            SupernetError::InsufficientBalance { .. } => Some(402),
            SupernetError::Timeout { .. } => Some(408),
            SupernetError::Validation { .. } => Some(400),
            SupernetError::ModelNotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Structured, serializable snapshot of this error for event payloads.
    pub fn info(&self) -> ErrorInfo {
        let details = match self {
            SupernetError::Timeout { duration } => Some(serde_json::json!({
                "timeoutMs": duration.as_millis() as u64,
            })),
            SupernetError::ModelNotFound { model_id } => Some(serde_json::json!({
                "modelId": model_id,
            })),
            SupernetError::Validation { field, .. } => Some(serde_json::json!({
                "field": field,
            })),
            _ => None,
        };
        ErrorInfo {
            code: self.code().to_string(),
            message: self.to_string(),
            status_code: self.status_code(),
            details,
        }
    }
}

/// Immutable error snapshot carried in events and connection state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Rebuild a taxonomy error from a snapshot. Used when a second caller
    /// adopts the outcome of a connection attempt it did not start.
    pub(crate) fn to_error(&self) -> SupernetError {
        match self.code.as_str() {
            "authentication_error" => SupernetError::Authentication {
                message: self.message.clone(),
            },
            "timeout_error" => {
                let ms = self
                    .details
                    .as_ref()
                    .and_then(|d| d.get("timeoutMs"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                SupernetError::Timeout {
                    duration: Duration::from_millis(ms),
                }
            }
            "connection_error" => SupernetError::Connection {
                message: self.message.clone(),
            },
            _ => SupernetError::Unknown {
                message: self.message.clone(),
            },
        }
    }
}

/// Classify a failed connection attempt. Auth-flavored messages become
/// [`SupernetError::Authentication`]; anything else is a connectivity failure.
pub(crate) fn classify_connect_failure(err: SupernetError) -> SupernetError {
    match err {
        SupernetError::Authentication { .. } => err,
        other => {
            let message = other.to_string();
            let lower = message.to_lowercase();
            let auth_flavored = ["auth", "login", "credential", "password", "401"]
                .iter()
                .any(|token| lower.contains(token));
            if auth_flavored {
                SupernetError::Authentication { message }
            } else {
                SupernetError::Connection { message }
            }
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SupernetError>;
