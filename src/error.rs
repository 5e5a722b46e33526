//! Unified application error model and mapping helpers.
//! Storage, config and registry code all report through `AppError`; the HTTP
//! boundary (external) translates it with `http_status`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    #[error("{code}: {message}")]
    NotFound { code: String, message: String },
    #[error("{code}: {message}")]
    InvalidArgument { code: String, message: String },
    #[error("{code}: {message}")]
    Conflict { code: String, message: String },
    #[error("{code}: {message}")]
    Io { code: String, message: String },
    #[error("{code}: {message}")]
    Parse { code: String, message: String },
    #[error("{code}: {message}")]
    Unavailable { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::NotFound { code, .. }
            | AppError::InvalidArgument { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Io { code, .. }
            | AppError::Parse { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::NotFound { message, .. }
            | AppError::InvalidArgument { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Io { message, .. }
            | AppError::Parse { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn invalid<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::InvalidArgument { code: code.into(), message: msg.into() } }
    pub fn conflict<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn io<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn parse<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Parse { code: code.into(), message: msg.into() } }
    pub fn unavailable<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn is_not_found(&self) -> bool { matches!(self, AppError::NotFound { .. }) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::InvalidArgument { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Parse { .. } => 422,
            AppError::Io { .. } => 503,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound { code: "not_found".into(), message: err.to_string() },
            std::io::ErrorKind::AlreadyExists => AppError::Conflict { code: "already_exists".into(), message: err.to_string() },
            _ => AppError::Io { code: "io_error".into(), message: err.to_string() },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse { code: "json_error".into(), message: err.to_string() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: unknown origin is internal unless downcast elsewhere
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
