//! Error types.
//!
//! Only configuration/request problems and the absence of any valid schedule
//! are fatal. Failures of individual evaluation tasks are reported as
//! [`TaskFailure`] values and never abort a run.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TimetableError>;

/// Fatal errors surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimetableError {
    /// A configuration parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The schedule request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The population never produced a chromosome satisfying the hard constraints.
    #[error("no valid solution found after {generations} generations")]
    NoValidSolution { generations: usize },
}

impl TimetableError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        TimetableError::InvalidConfig(message.into())
    }

    /// Creates a request error.
    pub fn request(message: impl Into<String>) -> Self {
        TimetableError::InvalidRequest(message.into())
    }
}

/// A single evaluation task that failed inside a worker pool.
///
/// Carries the input index so callers can tell which item is affected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task {index} failed: {message}")]
pub struct TaskFailure {
    /// Position of the failed item in the input batch.
    pub index: usize,
    /// Panic payload or error description.
    pub message: String,
}
