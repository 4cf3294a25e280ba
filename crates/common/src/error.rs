//! Error types shared across PanoFrame crates.

use std::path::PathBuf;

/// Top-level error type for PanoFrame operations.
#[derive(Debug, thiserror::Error)]
pub enum PanoframeError {
    #[error("Geometry error: {message}")]
    Geometry { message: String },

    #[error("Telemetry error: {message}")]
    Telemetry { message: String },

    #[error("Extraction error: {message}")]
    Extraction { message: String },

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PanoframeError.
pub type PanoframeResult<T> = Result<T, PanoframeError>;

impl PanoframeError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry {
            message: msg.into(),
        }
    }

    pub fn telemetry(msg: impl Into<String>) -> Self {
        Self::Telemetry {
            message: msg.into(),
        }
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
