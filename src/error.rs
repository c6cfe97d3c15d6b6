//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.
//!
//! None of these conditions are retried: a column mismatch, a malformed
//! sample buffer or a tree that does not fit the configured sample count
//! invalidates the whole optimization run, so every error is propagated to
//! the caller of `evaluate()` or of the constructor that detected it.

use thiserror::Error;

/// Main error type for potts-cd operations
#[derive(Error, Debug)]
pub enum PottsError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Run summary (de)serialization failures
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Column count of a parameter or tree source disagrees with the alignment
    #[error("Mismatching number of columns ({context}): alignment {expected}, found {found}")]
    ColumnMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// Sample buffer and parameter vector disagree on shape at the sampler boundary
    #[error("Shape violation: {message}")]
    ShapeViolation { message: String },

    /// Tree leaf count does not match the configured number of samples
    #[error("Tree has {leaves} leaves but {samples} samples were requested")]
    DegenerateTree { leaves: usize, samples: usize },

    /// Invalid data errors (weights length, out-of-alphabet symbols, empty alignment)
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Configuration errors (invalid CLI arguments or regularization settings)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Type alias for Results using PottsError
pub type Result<T> = std::result::Result<T, PottsError>;

impl PottsError {
    /// Create a column mismatch error
    pub fn column_mismatch(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::ColumnMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    /// Create a shape violation error
    pub fn shape(message: impl Into<String>) -> Self {
        Self::ShapeViolation {
            message: message.into(),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
