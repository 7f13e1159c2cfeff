//! Extractor registry: explicit name → factory table
//!
//! Built once at process start. The registry is itself an `Extractor`: it
//! accepts exactly the registered names and delegates `extract` to a fresh
//! instance from the matching factory.

use super::checksum::ChecksumExtractor;
use super::file_info::FileInfoExtractor;
use super::traits::{ExtractError, Extractor};
use crate::job::JobRecord;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Builds an extractor instance on demand.
pub type ExtractorFactory = Arc<dyn Fn() -> Arc<dyn Extractor> + Send + Sync>;

/// Name → factory table of available extractors.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    factories: BTreeMap<String, ExtractorFactory>,
}

impl ExtractorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the extractors that ship with the crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ChecksumExtractor::NAME, || Arc::new(ChecksumExtractor::new()));
        registry.register(FileInfoExtractor::NAME, || Arc::new(FileInfoExtractor::new()));
        registry
    }

    /// Register (or replace) the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Extractor> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.factories.get(name).map(|factory| factory())
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[async_trait]
impl Extractor for ExtractorRegistry {
    fn accept(&self, extractor: &str) -> bool {
        self.contains(extractor)
    }

    async fn extract(
        &self,
        path: &Path,
        job: &mut JobRecord,
        extractor: &str,
    ) -> Result<(), ExtractError> {
        let instance = self
            .create(extractor)
            .ok_or_else(|| ExtractError::Unimplemented(extractor.to_string()))?;
        instance.extract(path, job, extractor).await
    }
}
