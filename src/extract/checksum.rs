//! `sha256` extractor — content hash of the input file

use super::traits::{ExtractError, Extractor};
use crate::job::JobRecord;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Field holding the lowercase hex digest
pub const CONTENT_HASH: &str = "content_hash";
/// Field naming the digest algorithm
pub const CONTENT_HASH_ALGORITHM: &str = "content_hash_algorithm";

const BUFFER_SIZE: usize = 64 * 1024;

/// Streams the file through SHA-256.
#[derive(Debug, Default)]
pub struct ChecksumExtractor;

impl ChecksumExtractor {
    pub const NAME: &'static str = "sha256";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for ChecksumExtractor {
    async fn extract(
        &self,
        path: &Path,
        job: &mut JobRecord,
        _extractor: &str,
    ) -> Result<(), ExtractError> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let bytes_read = file.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        job.set_field(CONTENT_HASH, hex::encode(hasher.finalize()), false);
        job.set_field(CONTENT_HASH_ALGORITHM, Self::NAME, false);
        Ok(())
    }
}
