//! Error handling and error types for the fast random forest crate.
//!
//! All fallible operations return [`Result`], backed by the [`ForestError`]
//! enum. Recoverable conditions (a dataset that reduces to the class
//! attribute alone, an attribute with only missing values) are handled
//! locally and never surface as errors.

use crate::core::types::{AttributeIndex, AttributeKind};
use thiserror::Error;

/// Main error type for forest training and prediction.
#[derive(Error, Debug)]
pub enum ForestError {
    /// Dataset declares an attribute kind other than numeric or nominal.
    #[error("unsupported attribute kind {kind} at attribute {index}: only numeric and nominal attributes are supported")]
    UnsupportedAttributeKind {
        /// Index of the offending attribute.
        index: AttributeIndex,
        /// The declared kind.
        kind: AttributeKind,
    },

    /// Requested per-tree feature count is not below the attribute count.
    #[error("invalid feature count: requested {requested} features per tree, dataset has {num_attributes} attributes")]
    InvalidFeatureCount {
        /// Features requested per tree.
        requested: usize,
        /// Total number of attributes, class included.
        num_attributes: usize,
    },

    /// Dropout importance or interactions were requested but the
    /// tree/attribute coverage constraints cannot be met.
    #[error("insufficient tree coverage: {message}")]
    InsufficientTreeCoverage {
        /// Why the coverage constraint fails.
        message: String,
    },

    /// Configuration and validation errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Dataset construction and consistency errors.
    #[error("dataset error: {message}")]
    Dataset {
        /// Description of the dataset problem.
        message: String,
    },

    /// Prediction input errors.
    #[error("prediction error: {message}")]
    Prediction {
        /// Description of the prediction problem.
        message: String,
    },

    /// Internal invariant violations (indicate an implementation bug).
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl ForestError {
    /// Create a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        ForestError::Config {
            message: message.into(),
        }
    }

    /// Create a dataset error.
    pub fn dataset<S: Into<String>>(message: S) -> Self {
        ForestError::Dataset {
            message: message.into(),
        }
    }

    /// Create a prediction error.
    pub fn prediction<S: Into<String>>(message: S) -> Self {
        ForestError::Prediction {
            message: message.into(),
        }
    }

    /// Create an insufficient-tree-coverage error.
    pub fn insufficient_coverage<S: Into<String>>(message: S) -> Self {
        ForestError::InsufficientTreeCoverage {
            message: message.into(),
        }
    }

    /// Create an internal error (should be used sparingly).
    pub fn internal<S: Into<String>>(message: S) -> Self {
        ForestError::Internal {
            message: message.into(),
        }
    }

    /// Returns the error category as a static string.
    pub fn category(&self) -> &'static str {
        match self {
            ForestError::UnsupportedAttributeKind { .. } => "dataset",
            ForestError::InvalidFeatureCount { .. } => "sampling",
            ForestError::InsufficientTreeCoverage { .. } => "diagnostics",
            ForestError::Config { .. } => "config",
            ForestError::Dataset { .. } => "dataset",
            ForestError::Prediction { .. } => "prediction",
            ForestError::Internal { .. } => "internal",
        }
    }
}

/// Convenient result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ForestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForestError::UnsupportedAttributeKind {
            index: 3,
            kind: AttributeKind::Text,
        };
        let text = err.to_string();
        assert!(text.contains("attribute 3"));
        assert!(text.contains("text"));
        assert_eq!(err.category(), "dataset");
    }

    #[test]
    fn test_error_helpers() {
        let err = ForestError::config("bad num_trees");
        assert_eq!(err.category(), "config");
        assert!(err.to_string().contains("bad num_trees"));

        let err = ForestError::InvalidFeatureCount {
            requested: 10,
            num_attributes: 10,
        };
        assert_eq!(err.category(), "sampling");
    }
}
