//! Extraction layer
//!
//! The `Extractor` contract, the explicit registry the binary builds at
//! startup, and the extractors that ship with the crate.

pub mod checksum;
pub mod file_info;
mod registry;
mod traits;

pub use checksum::ChecksumExtractor;
pub use file_info::FileInfoExtractor;
pub use registry::{ExtractorFactory, ExtractorRegistry};
pub use traits::{ExtractError, Extractor};
