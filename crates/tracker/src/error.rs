//! Error types for the stack tracker.

use thiserror::Error;

/// A [Result] type over a generic value with [TrackerError].
pub type TrackerResult<T> = Result<T, TrackerError>;

/// An error raised while constructing a stack tracker.
///
/// Tracker operations themselves never fail; anything that goes wrong while tracking is reported as
/// a diagnostic and the emulator carries on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// The tracker was configured without a required collaborator.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}
