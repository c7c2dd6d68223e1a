//! Error types for TutorBuddy
//!
//! Retrieval adapters never surface these: their failures are folded into
//! sentinel results. Everything else propagates a `TutorError`.

use thiserror::Error;

/// Main error type for the tutor pipeline
#[derive(Error, Debug)]
pub enum TutorError {
    /// A required API key is absent from the environment
    #[error("Missing credential: {var} is not set ({purpose})")]
    MissingCredential { var: String, purpose: String },

    /// Query was empty after trimming
    #[error("Query must not be empty")]
    EmptyQuery,

    /// Remote inference endpoint errors
    #[error("Inference API error: {0}")]
    InferenceApi(String),

    /// Streaming errors
    #[error("Streaming error: {0}")]
    StreamingError(String),

    /// Vision endpoint errors
    #[error("Vision API error: {0}")]
    VisionApi(String),

    /// Image crawl errors
    #[error("Image crawl failed: {0}")]
    Crawl(String),

    /// Vector index errors
    #[error("Vector index error: {0}")]
    Index(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic errors with context
    #[error("Tutor error: {0}")]
    Generic(String),
}

/// Result type alias for tutor operations
pub type Result<T> = std::result::Result<T, TutorError>;
