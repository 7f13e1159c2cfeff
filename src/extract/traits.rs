//! Extractor trait — the contract concrete extractors implement

use crate::job::JobRecord;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from an extractor run.
///
/// `Unimplemented` is a programming error and aborts the invocation. The
/// other variants describe content problems: the worker records them on the
/// job and keeps routing it.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extractor '{0}' does not implement extract")]
    Unimplemented(String),
    #[error("extraction failed: {0}")]
    Content(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// True for failures that belong on the job rather than in the caller's error path.
    pub fn is_soft(&self) -> bool {
        !matches!(self, Self::Unimplemented(_))
    }
}

/// Populates structured fields on a job from a local file.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Whether this extractor handles jobs naming `extractor`.
    fn accept(&self, _extractor: &str) -> bool {
        true
    }

    /// Inspect `path` and write results into `job` via `set_field`,
    /// `warning` and friends.
    async fn extract(
        &self,
        _path: &Path,
        _job: &mut JobRecord,
        extractor: &str,
    ) -> Result<(), ExtractError> {
        Err(ExtractError::Unimplemented(extractor.to_string()))
    }
}
