//! Error handling for the viewbar engine
//!
//! This module defines the crate-wide error type and a Result alias. Stage and
//! list contract violations live in [`crate::pipeline::error`] and convert
//! into [`ViewBarError`] with `?`. Grammar failures never surface as errors:
//! they mark the stage invalid.

use crate::pipeline::error::PipelineError;
use thiserror::Error;

/// Main error type for viewbar operations
#[derive(Error, Debug)]
pub enum ViewBarError {
    /// Stage or stage-list contract violations
    #[error("Pipeline error: {0}")]
    Stage(#[from] PipelineError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// The backend session reported a fault
    #[error("Session error: {0}")]
    Session(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ViewBarError>,
    },
}

impl ViewBarError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ViewBarError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for ViewBarError {
    fn from(err: serde_json::Error) -> Self {
        ViewBarError::Serialization(err.to_string())
    }
}

/// Result type alias for viewbar operations
pub type Result<T> = std::result::Result<T, ViewBarError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
