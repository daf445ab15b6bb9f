//! Error types for timer scheduling

use thiserror::Error;

/// Errors raised when a scheduling primitive cannot be allocated.
///
/// Construction is the only fallible point: once a manager exists, every
/// operation on it is a non-blocking request that cannot fail.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// No Tokio runtime is available to host the background activity.
    #[error("no tokio runtime available for timer scheduling")]
    NoRuntime,

    /// The tick interval cannot be turned into a schedule period.
    #[error("invalid tick interval {0}: must be finite, non-zero, and within duration range")]
    InvalidInterval(f64),

    /// The scheduling backend refused to allocate another tick source.
    #[error("scheduling backend exhausted, no tick source available")]
    Exhausted,
}
