//! Error taxonomy for the engine
//!
//! All errors are raised at the boundary (constructor or public method
//! entry) and surface to the caller unmodified. An archive rejecting a
//! candidate is not an error; see [`AddStatus::NotAdded`](crate::AddStatus).

/// Errors produced by archives, emitters and schedulers.
#[derive(Debug, thiserror::Error)]
pub enum QdError {
    #[error("{what} has length {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid objective: {0}")]
    InvalidObjective(String),

    #[error("archive is empty")]
    EmptyArchive,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, QdError>;
