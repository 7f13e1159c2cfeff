//! Sift: per-job metadata-extraction worker
//!
//! A worker receives one job describing a file, runs a pluggable extractor
//! over it, and routes the enriched record along the pipeline described in
//! the job itself.
//!
//! # Core Concepts
//!
//! - **JobRecord**: free-form JSON job with a route and an `entry.fields` result bag
//! - **Router**: claims and completes one stage of the job's route at a time
//! - **Extractor**: the `accept`/`extract` contract concrete extractors implement
//! - **ExtractionWorker**: resolve → extract → forward or print
//! - **StatusWriter**: framed progress lines for an external supervisor
//!
//! # Example
//!
//! ```
//! use sift::{JobRecord, Router, STAGE_EXTRACT};
//! use serde_json::json;
//!
//! let mut job = JobRecord::from_source(json!({
//!     "id": "1",
//!     "route": [{"type": "EXTRACT", "addr": ""}, {"type": "NOP"}]
//! })).unwrap();
//!
//! let mut router = Router::new("worker-1");
//! assert!(router.start(&mut job, STAGE_EXTRACT));
//! assert_eq!(router.complete(&mut job).unwrap(), Some(1));
//! ```

pub mod config;
pub mod control;
mod error;
pub mod extract;
pub mod forward;
mod job;
pub mod logging;
mod router;
pub mod status;
mod worker;

pub use error::{SiftError, SiftResult};
pub use extract::{ExtractError, Extractor, ExtractorRegistry};
pub use job::{
    ErrorCode, JobRecord, RoutingStage, ERROR_CODE, ERROR_MESSAGE, ERROR_TRACE, INDEXING_WARNING,
    STAGE_EXTRACT, STAGE_NOP,
};
pub use router::Router;
pub use status::{StatusWriter, WorkerState};
pub use worker::ExtractionWorker;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
