//! Error types for Jotter
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to a UI layer as plain strings.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl AppError {
    /// Whether repeating the same remote call may succeed.
    ///
    /// Transport failures and throttling/server-side statuses qualify;
    /// client errors (bad request, auth, validation) do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Http(e) => !e.is_builder() && !e.is_decode(),
            AppError::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
