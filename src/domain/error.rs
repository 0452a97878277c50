use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteErrorKind {
    Authentication,
    NotFound,
    RateLimit,
    Network,
    Validation,
}

impl RemoteErrorKind {
    /// Status 0 stands for a transport failure that never produced a response.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => RemoteErrorKind::Authentication,
            404 => RemoteErrorKind::NotFound,
            429 => RemoteErrorKind::RateLimit,
            0 => RemoteErrorKind::Network,
            _ => RemoteErrorKind::Validation,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RemoteErrorKind::Authentication => "AuthenticationError",
            RemoteErrorKind::NotFound => "NotFoundError",
            RemoteErrorKind::RateLimit => "RateLimitError",
            RemoteErrorKind::Network => "NetworkError",
            RemoteErrorKind::Validation => "ValidationError",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub status: u16,
    pub message: String,
}

impl RemoteError {
    pub fn from_response(status: u16, body: String) -> Self {
        let message = if body.trim().is_empty() {
            format!("Azure DevOps API error ({})", status)
        } else {
            body
        };
        Self {
            kind: RemoteErrorKind::from_status(status),
            status,
            message,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Network,
            status: 0,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    DatabaseError(String),
    ConfigError(String),
    SecurityError(String),
    IoError(String),
    Remote(RemoteError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "InternalError",
            AppError::NotFound(_) => "NotFound",
            AppError::ValidationError(_) => "ValidationError",
            AppError::DatabaseError(_) => "DatabaseError",
            AppError::ConfigError(_) => "ConfigError",
            AppError::SecurityError(_) => "SecurityError",
            AppError::IoError(_) => "IoError",
            AppError::Remote(err) => err.kind.code(),
        }
    }

    /// The payload without the category prefix `Display` adds.
    pub fn message(&self) -> &str {
        match self {
            AppError::Internal(msg)
            | AppError::NotFound(msg)
            | AppError::ValidationError(msg)
            | AppError::DatabaseError(msg)
            | AppError::ConfigError(msg)
            | AppError::SecurityError(msg)
            | AppError::IoError(msg) => msg,
            AppError::Remote(err) => &err.message,
        }
    }

    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, AppError::Remote(err) if err.kind == RemoteErrorKind::NotFound)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
            AppError::Remote(err) => write!(
                f,
                "{} ({}): {}",
                err.kind.code(),
                err.status,
                err.message
            ),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        AppError::Remote(err)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
