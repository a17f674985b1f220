//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Model output could not be parsed as JSON even after fence-stripping
    /// and brace-extraction. Carries the raw text for diagnostics.
    #[error("Unparsable model output: {reason}")]
    UnparsableOutput { reason: String, raw: String },

    /// Parsed JSON could not be interpreted as one of the document variants.
    #[error("Classification error: {0}")]
    Classification(String),

    /// A field failed its type/range constraint during construction.
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Vision-model invocation failed. Retry policy belongs to the caller.
    #[error("Analysis error: {0}")]
    Analysis(String),
}

impl Error {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
