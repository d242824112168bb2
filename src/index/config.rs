//! Index writer configuration.

use std::sync::Arc;

use crate::analysis::Analyzer;
use crate::error::{Result, TesseraError};
use crate::index::merge_policy::MergePolicy;

/// Default number of buffered documents that triggers a flush.
pub const DEFAULT_MAX_BUFFERED_DOCS: usize = 1000;

/// Settings of an [`IndexWriter`](crate::index::writer::IndexWriter).
///
/// Every field is checked at construction, so a config that exists is valid.
///
/// ```
/// use std::sync::Arc;
/// use tessera::analysis::StandardAnalyzer;
/// use tessera::index::{IndexWriterConfig, NoMergePolicy};
///
/// let config = IndexWriterConfig::builder()
///     .analyzer(Arc::new(StandardAnalyzer::new()))
///     .merge_policy(Arc::new(NoMergePolicy::new()))
///     .max_buffered_docs(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_buffered_docs(), 2);
///
/// assert!(IndexWriterConfig::builder().build().is_err());
/// ```
#[derive(Clone)]
pub struct IndexWriterConfig {
    analyzer: Arc<dyn Analyzer>,
    merge_policy: Arc<dyn MergePolicy>,
    max_buffered_docs: usize,
}

impl IndexWriterConfig {
    /// Create a validated configuration.
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        merge_policy: Arc<dyn MergePolicy>,
        max_buffered_docs: usize,
    ) -> Result<Self> {
        if max_buffered_docs == 0 {
            return Err(TesseraError::invalid_config(
                "max_buffered_docs must be greater than 0",
            ));
        }
        merge_policy.config().validate()?;

        Ok(IndexWriterConfig {
            analyzer,
            merge_policy,
            max_buffered_docs,
        })
    }

    pub fn builder() -> IndexWriterConfigBuilder {
        IndexWriterConfigBuilder::default()
    }

    pub fn analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.analyzer
    }

    pub fn merge_policy(&self) -> &Arc<dyn MergePolicy> {
        &self.merge_policy
    }

    /// Buffered documents that trigger an automatic flush.
    pub fn max_buffered_docs(&self) -> usize {
        self.max_buffered_docs
    }
}

impl std::fmt::Debug for IndexWriterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriterConfig")
            .field("analyzer", &self.analyzer.name())
            .field("merge_policy", &self.merge_policy.name())
            .field("max_buffered_docs", &self.max_buffered_docs)
            .finish()
    }
}

/// Builder for [`IndexWriterConfig`]. The analyzer and merge policy have no
/// defaults and must be set.
#[derive(Clone)]
pub struct IndexWriterConfigBuilder {
    analyzer: Option<Arc<dyn Analyzer>>,
    merge_policy: Option<Arc<dyn MergePolicy>>,
    max_buffered_docs: usize,
}

impl Default for IndexWriterConfigBuilder {
    fn default() -> Self {
        IndexWriterConfigBuilder {
            analyzer: None,
            merge_policy: None,
            max_buffered_docs: DEFAULT_MAX_BUFFERED_DOCS,
        }
    }
}

impl IndexWriterConfigBuilder {
    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn merge_policy(mut self, merge_policy: Arc<dyn MergePolicy>) -> Self {
        self.merge_policy = Some(merge_policy);
        self
    }

    pub fn max_buffered_docs(mut self, max_buffered_docs: usize) -> Self {
        self.max_buffered_docs = max_buffered_docs;
        self
    }

    pub fn build(self) -> Result<IndexWriterConfig> {
        let analyzer = self
            .analyzer
            .ok_or_else(|| TesseraError::invalid_config("analyzer is required"))?;
        let merge_policy = self
            .merge_policy
            .ok_or_else(|| TesseraError::invalid_config("merge_policy is required"))?;
        IndexWriterConfig::new(analyzer, merge_policy, self.max_buffered_docs)
    }
}

impl std::fmt::Debug for IndexWriterConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriterConfigBuilder")
            .field("analyzer", &self.analyzer.as_ref().map(|a| a.name()))
            .field("merge_policy", &self.merge_policy.as_ref().map(|p| p.name()))
            .field("max_buffered_docs", &self.max_buffered_docs)
            .finish()
    }
}
