//! Error types for the BookHub client

use serde_json::Value;
use thiserror::Error;

/// Main client error type.
///
/// Payloads are plain strings so the error can be cloned: a single refresh
/// outcome is handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("No refresh token stored")]
    NoRefreshToken,

    #[error("Refresh rejected: {0}")]
    RefreshRejected(String),

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Validation error: {message}")]
    Validation {
        status: u16,
        message: String,
        body: String,
    },

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Map a non-success HTTP response to an error.
    ///
    /// 401 is not special-cased here: the request pipeline intercepts it
    /// before this is reached, and endpoints that do not go through the
    /// pipeline (login) decide for themselves.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| default_message(status));

        match status {
            400 | 422 => ClientError::Validation {
                status,
                message,
                body: body.to_string(),
            },
            500..=599 => ClientError::Server { status, message },
            _ => ClientError::Api {
                status,
                message,
                body: body.to_string(),
            },
        }
    }

    /// Whether this error ends the session (caller must go back to login)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClientError::NoRefreshToken | ClientError::RefreshRejected(_) | ClientError::SessionExpired
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        ClientError::InvalidInput(messages.join("; "))
    }
}

impl From<redis::RedisError> for ClientError {
    fn from(e: redis::RedisError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(e: config::ConfigError) -> Self {
        ClientError::Config(e.to_string())
    }
}

/// Pull a human readable message out of a REST framework error body.
///
/// Understands `{"detail": ..}`, `{"error": ..}` and field errors such as
/// `{"email": ["user with this email already exists."]}`.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    for key in ["detail", "error", "message"] {
        if let Some(Value::String(msg)) = object.get(key) {
            return Some(msg.clone());
        }
    }

    object.iter().find_map(|(field, value)| match value {
        Value::Array(items) => items
            .iter()
            .find_map(Value::as_str)
            .map(|msg| format!("{}: {}", field, msg)),
        Value::String(msg) => Some(format!("{}: {}", field, msg)),
        _ => None,
    })
}

fn default_message(status: u16) -> String {
    match status {
        400 => "Bad request".to_string(),
        401 => "Not authenticated".to_string(),
        403 => "Permission denied".to_string(),
        404 => "Not found".to_string(),
        500..=599 => "Server error".to_string(),
        _ => format!("Request failed with status {}", status),
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
