//! Unified client error model and HTTP status mapping.
//! Every fallible operation in the crate returns `ClientError`; UI hosts render
//! `user_message()` inline next to the action that failed.

use serde_json::Value;
use thiserror::Error;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// 401 from the backend that the refresh protocol could not (or must not) recover.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    /// The refresh token was missing or rejected; the session has been cleared.
    #[error("session expired: {message}")]
    SessionExpired { message: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("validation failed ({status}): {message}")]
    Validation { status: u16, message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("network error: {message}")]
    Network { message: String },
    #[error("decode error: {message}")]
    Decode { message: String },
    /// Rejected locally before any request was sent.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("config error: {message}")]
    Config { message: String },
    #[error("request cancelled")]
    Cancelled,
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self { ClientError::Unauthorized { message: msg.into() } }
    pub fn session_expired<S: Into<String>>(msg: S) -> Self { ClientError::SessionExpired { message: msg.into() } }
    pub fn network<S: Into<String>>(msg: S) -> Self { ClientError::Network { message: msg.into() } }
    pub fn decode<S: Into<String>>(msg: S) -> Self { ClientError::Decode { message: msg.into() } }
    pub fn invalid<S: Into<String>>(msg: S) -> Self { ClientError::InvalidInput { message: msg.into() } }
    pub fn storage<S: Into<String>>(msg: S) -> Self { ClientError::Storage { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { ClientError::Config { message: msg.into() } }

    /// Map a non-success HTTP response to an error, preferring the backend's own message.
    pub fn from_response(status: u16, body: &Value) -> Self {
        let message = backend_message(body).unwrap_or_else(|| default_message(status).to_string());
        match status {
            401 => ClientError::Unauthorized { message },
            403 => ClientError::Forbidden { message },
            404 => ClientError::NotFound { message },
            409 => ClientError::Conflict { message },
            400..=499 => ClientError::Validation { status, message },
            _ => ClientError::Server { status, message },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Unauthorized { .. } => "unauthorized",
            ClientError::SessionExpired { .. } => "session_expired",
            ClientError::Forbidden { .. } => "forbidden",
            ClientError::NotFound { .. } => "not_found",
            ClientError::Validation { .. } => "validation",
            ClientError::Conflict { .. } => "conflict",
            ClientError::Server { .. } => "server_error",
            ClientError::Network { .. } => "network_error",
            ClientError::Decode { .. } => "decode_error",
            ClientError::InvalidInput { .. } => "invalid_input",
            ClientError::Storage { .. } => "storage_error",
            ClientError::Config { .. } => "config_error",
            ClientError::Cancelled => "cancelled",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ClientError::Unauthorized { message }
            | ClientError::SessionExpired { message }
            | ClientError::Forbidden { message }
            | ClientError::NotFound { message }
            | ClientError::Validation { message, .. }
            | ClientError::Conflict { message }
            | ClientError::Server { message, .. }
            | ClientError::Network { message }
            | ClientError::Decode { message }
            | ClientError::InvalidInput { message }
            | ClientError::Storage { message }
            | ClientError::Config { message } => message.as_str(),
            ClientError::Cancelled => "request cancelled",
        }
    }

    /// HTTP status this error came from, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized { .. } => Some(401),
            ClientError::Forbidden { .. } => Some(403),
            ClientError::NotFound { .. } => Some(404),
            ClientError::Conflict { .. } => Some(409),
            ClientError::Validation { status, .. } | ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. } | ClientError::SessionExpired { .. })
    }

    /// Text suitable for an inline banner. Server and transport failures stay generic.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { .. } | ClientError::Network { .. } | ClientError::Decode { .. } | ClientError::Storage { .. } => {
                GENERIC_FAILURE.to_string()
            }
            other => other.message().to_string(),
        }
    }
}

/// Backend errors carry `message` as a string or, for validation pipes, an array of strings.
fn backend_message(body: &Value) -> Option<String> {
    match body.get("message")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            if parts.is_empty() { None } else { Some(parts.join("; ")) }
        }
        _ => None,
    }
}

fn default_message(status: u16) -> &'static str {
    match status {
        401 => "authentication required",
        403 => "you do not have permission to perform this action",
        404 => "resource not found",
        409 => "request conflicts with current state",
        400..=499 => "request rejected",
        _ => GENERIC_FAILURE,
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode { message: err.to_string() }
        } else {
            ClientError::Network { message: err.to_string() }
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode { message: err.to_string() }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage { message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
