// src/error.rs

//! Unified error handling for the change detector.

use std::fmt;

use thiserror::Error;

/// Result type alias for change detector operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catalog query failed
    #[error("Catalog error in {context}: {message}")]
    Catalog { context: String, message: String },

    /// Rendering a product page failed
    #[error("Render error for {sku}: {message}")]
    Render { sku: String, message: String },

    /// Admin API request failed
    #[error("Admin API {operation} failed ({status}): {message}")]
    Admin {
        operation: String,
        status: u16,
        message: String,
    },

    /// Blob store operation failed
    #[error("Storage error for {key}: {message}")]
    Storage { key: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a catalog error with context.
    pub fn catalog(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Catalog {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a render error for a SKU.
    pub fn render(sku: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Render {
            sku: sku.into(),
            message: message.to_string(),
        }
    }

    /// Create an admin API error. Use status 0 when no response was received.
    pub fn admin(operation: impl Into<String>, status: u16, message: impl fmt::Display) -> Self {
        Self::Admin {
            operation: operation.into(),
            status,
            message: message.to_string(),
        }
    }

    /// Create a storage error for a key.
    pub fn storage(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error belongs to the configuration class that aborts a run.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_) | Self::Toml(_))
    }
}
