use reqwest::StatusCode;
use serde_json::Value;
use shelfmark_core::{ExitCode, ShelfmarkError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP status (connection refused, DNS, timeout).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response (HTTP {status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Core(#[from] ShelfmarkError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Classify a non-success response. `body` is the raw response text; a
    /// JSON `message` field is preferred over the raw text.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = server_message(body).unwrap_or_default();
        match status.as_u16() {
            400 | 422 => Self::Validation(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            s if s >= 500 => Self::Server { status: s, message },
            s => Self::Unexpected { status: s, message },
        }
    }

    /// HTTP status, with transport failures reported as 0.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network(_) => Some(0),
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Validation(_) => Some(400),
            Self::Conflict(_) => Some(409),
            Self::Server { status, .. } | Self::Unexpected { status, .. } => Some(*status),
            Self::Parse(_) | Self::Core(_) => None,
        }
    }

    /// The caller must sign in (again) before retrying.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::Core(ShelfmarkError::NotSignedIn)
        )
    }

    /// Text suitable for showing inline next to the failed action.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Unable to connect to server. Please check your connection.".to_string()
            }
            Self::Unauthorized(_) => "Session expired. Please login again.".to_string(),
            Self::Forbidden(msg) => or_default(
                msg,
                "Access denied. You do not have permission to perform this action.",
            ),
            Self::NotFound(msg) => or_default(msg, "The requested item was not found."),
            Self::Validation(msg) => or_default(
                msg,
                "Invalid data provided. Please check your information.",
            ),
            Self::Conflict(msg) => or_default(msg, "The request conflicts with existing data."),
            Self::Server { .. } => "Server error. Please try again later.".to_string(),
            Self::Unexpected { message, .. } => or_default(
                message,
                "An unexpected error occurred. Please try again.",
            ),
            Self::Parse(_) => "Received an unreadable response from the server.".to_string(),
            Self::Core(e) => e.to_string(),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Network(_) => ExitCode::NetworkError,
            Self::Unauthorized(_) | Self::Core(ShelfmarkError::NotSignedIn) => {
                ExitCode::AuthRequired
            }
            Self::Forbidden(_) => ExitCode::Forbidden,
            Self::NotFound(_) => ExitCode::NotFound,
            Self::Validation(_) | Self::Core(ShelfmarkError::Validation(_)) => {
                ExitCode::InvalidArgs
            }
            Self::Conflict(_) => ExitCode::Conflict,
            Self::Server { .. } => ExitCode::ServerError,
            _ => ExitCode::GeneralError,
        }
    }
}

fn or_default(msg: &str, fallback: &str) -> String {
    if msg.trim().is_empty() {
        fallback.to_string()
    } else {
        msg.to_string()
    }
}

fn server_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .get("message")
            .or_else(|| json.get("title"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        Err(_) => Some(body.to_string()),
    }
}
