//! Error handling and error types for distgbt.
//!
//! Errors follow the taxonomy of the training core: configuration errors are
//! raised before any work starts, data errors during the first shard scan,
//! collective errors whenever a peer stalls or disappears. Numeric
//! degeneracies are never errors (they become forced leaves).

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum GbtError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid hyperparameter value
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Dataset-related errors naming the offending column
    #[error("Dataset error in column '{column}': {message}")]
    Dataset { column: String, message: String },

    /// Feature dimensionality differs between rows or shards
    #[error("Data dimension mismatch: expected {expected} features, shard {shard} has {actual}")]
    DataDimensionMismatch {
        shard: usize,
        expected: usize,
        actual: usize,
    },

    /// A collective operation failed on some rank
    #[error("Collective failure on rank {rank} (timeout {timeout:?}): {message}")]
    Collective {
        rank: usize,
        timeout: Duration,
        message: String,
    },

    /// Training-related errors
    #[error("Training error: {message}")]
    Training { message: String },

    /// Prediction errors
    #[error("Prediction error: {message}")]
    Prediction { message: String },

    /// Model serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Bincode serialization errors
    #[error("Bincode error: {source}")]
    Bincode {
        #[from]
        source: bincode::Error,
    },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results using GbtError
pub type Result<T> = std::result::Result<T, GbtError>;

impl GbtError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        GbtError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: ToString,
        R: Into<String>,
    {
        GbtError::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a dataset error for the given column
    pub fn dataset<C, S>(column: C, message: S) -> Self
    where
        C: Into<String>,
        S: Into<String>,
    {
        GbtError::Dataset {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error for a shard
    pub fn dimension_mismatch(shard: usize, expected: usize, actual: usize) -> Self {
        GbtError::DataDimensionMismatch {
            shard,
            expected,
            actual,
        }
    }

    /// Create a collective error
    pub fn collective<S: Into<String>>(rank: usize, timeout: Duration, message: S) -> Self {
        GbtError::Collective {
            rank,
            timeout,
            message: message.into(),
        }
    }

    /// Create a training error
    pub fn training<S: Into<String>>(message: S) -> Self {
        GbtError::Training {
            message: message.into(),
        }
    }

    /// Create a prediction error
    pub fn prediction<S: Into<String>>(message: S) -> Self {
        GbtError::Prediction {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        GbtError::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error (should be used sparingly)
    pub fn internal<S: Into<String>>(message: S) -> Self {
        GbtError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable by resubmitting the job.
    ///
    /// Collective and I/O failures are: the caller may resubmit from scratch
    /// or from the last persisted model.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GbtError::Collective { .. } | GbtError::IO { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            GbtError::Config { .. } => "config",
            GbtError::InvalidParameter { .. } => "invalid_parameter",
            GbtError::Dataset { .. } => "dataset",
            GbtError::DataDimensionMismatch { .. } => "data_dimension_mismatch",
            GbtError::Collective { .. } => "collective",
            GbtError::Training { .. } => "training",
            GbtError::Prediction { .. } => "prediction",
            GbtError::Serialization { .. } => "serialization",
            GbtError::IO { .. } => "io",
            GbtError::Json { .. } => "json",
            GbtError::Bincode { .. } => "bincode",
            GbtError::Internal { .. } => "internal",
        }
    }
}

/// Return early with the given error if the condition does not hold.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
