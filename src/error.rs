//! Worker-level error taxonomy
//!
//! Structural problems (bad job shape, bad pipeline wiring, missing
//! extension points) surface as `SiftError` and abort the invocation.
//! Content-level problems never reach this type: they are recorded on the
//! job record instead.

use crate::forward::TransportError;
use thiserror::Error;

/// Fatal, per-invocation errors.
#[derive(Debug, Error)]
pub enum SiftError {
    /// The job request itself is malformed (missing id, missing or unknown extractor).
    #[error("job spec error: {0}")]
    JobSpec(String),

    /// The route is inconsistent: a next stage exists but cannot be addressed.
    #[error("route error: {0}")]
    Route(String),

    /// A required extension point is missing, or a state machine was misused.
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("forwarding failed: {0}")]
    Forward(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for worker operations
pub type SiftResult<T> = Result<T, SiftError>;
