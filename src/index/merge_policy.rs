//! Merge policies for segment management.
//!
//! A policy looks at the metadata of the live segments and may propose a
//! [`MergeSpec`]. Nothing in this crate executes merges; the spec is handed
//! back to the caller of [`IndexWriter::find_merges`].
//!
//! [`IndexWriter::find_merges`]: crate::index::writer::IndexWriter::find_merges

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::segment::{SegmentMetadata, current_time_millis};

/// Lowest accepted `max_total_docs_per_segment` (exclusive).
pub const MIN_SEGMENT_DOCS: u64 = 1000;

/// Default number of segments combined by one merge.
pub const DEFAULT_MAX_SEGMENTS_MERGED_AT_ONCE: usize = 10;

/// Default cap on documents in a merged segment.
pub const DEFAULT_MAX_TOTAL_DOCS_PER_SEGMENT: u64 = 1_000_000;

/// Limits shared by merge policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicyConfig {
    /// Maximum number of segments combined by one merge. At least 2.
    pub max_segments_merged_at_once: usize,

    /// Maximum number of documents a merged segment may hold.
    pub max_total_docs_per_segment: u64,
}

impl Default for MergePolicyConfig {
    fn default() -> Self {
        MergePolicyConfig {
            max_segments_merged_at_once: DEFAULT_MAX_SEGMENTS_MERGED_AT_ONCE,
            max_total_docs_per_segment: DEFAULT_MAX_TOTAL_DOCS_PER_SEGMENT,
        }
    }
}

impl MergePolicyConfig {
    /// Create a validated configuration.
    pub fn new(max_segments_merged_at_once: usize, max_total_docs_per_segment: u64) -> Result<Self> {
        let config = MergePolicyConfig {
            max_segments_merged_at_once,
            max_total_docs_per_segment,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_segments_merged_at_once < 2 {
            return Err(TesseraError::invalid_config(format!(
                "max_segments_merged_at_once must be at least 2, got {}",
                self.max_segments_merged_at_once
            )));
        }
        if self.max_total_docs_per_segment <= MIN_SEGMENT_DOCS {
            return Err(TesseraError::invalid_config(format!(
                "max_total_docs_per_segment must exceed {MIN_SEGMENT_DOCS}, got {}",
                self.max_total_docs_per_segment
            )));
        }
        Ok(())
    }

    /// Whether merging `segments` would produce a segment over the limit.
    pub fn exceeds_max_docs(&self, segments: &[SegmentMetadata]) -> bool {
        total_documents(segments) > self.max_total_docs_per_segment
    }
}

/// A proposed merge: at least two segments and the merged segment's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSpec {
    segments: Vec<SegmentMetadata>,
    merged_name: String,
}

impl MergeSpec {
    pub fn new<S: Into<String>>(segments: Vec<SegmentMetadata>, merged_name: S) -> Result<Self> {
        if segments.len() < 2 {
            return Err(TesseraError::invalid_argument(format!(
                "a merge needs at least 2 segments, got {}",
                segments.len()
            )));
        }
        let merged_name = merged_name.into();
        if merged_name.is_empty() {
            return Err(TesseraError::invalid_argument("merged segment name is empty"));
        }
        Ok(MergeSpec {
            segments,
            merged_name,
        })
    }

    /// Name the merged segment `m_{count}_{millis}`.
    pub fn with_generated_name(segments: Vec<SegmentMetadata>) -> Result<Self> {
        let name = format!("m_{}_{}", segments.len(), current_time_millis());
        Self::new(segments, name)
    }

    pub fn segments(&self) -> &[SegmentMetadata] {
        &self.segments
    }

    pub fn merged_name(&self) -> &str {
        &self.merged_name
    }

    /// Documents in the merged segment.
    pub fn total_documents(&self) -> u64 {
        total_documents(&self.segments)
    }
}

fn total_documents(segments: &[SegmentMetadata]) -> u64 {
    segments
        .iter()
        .map(|segment| segment.document_count() as u64)
        .sum()
}

/// Trait for defining merge policies.
pub trait MergePolicy: Send + Sync + std::fmt::Debug {
    /// Propose a merge among `segments`, or `None` if nothing should merge.
    fn find_merges(&self, segments: &[SegmentMetadata]) -> Result<Option<MergeSpec>>;

    /// The limits this policy works under.
    fn config(&self) -> &MergePolicyConfig;

    /// Get the name of this policy.
    fn name(&self) -> &'static str;
}

/// A policy that never merges.
#[derive(Debug, Clone, Default)]
pub struct NoMergePolicy {
    config: MergePolicyConfig,
}

impl NoMergePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with explicit limits, validated up front.
    pub fn with_config(config: MergePolicyConfig) -> Result<Self> {
        config.validate()?;
        Ok(NoMergePolicy { config })
    }
}

impl MergePolicy for NoMergePolicy {
    fn find_merges(&self, _segments: &[SegmentMetadata]) -> Result<Option<MergeSpec>> {
        Ok(None)
    }

    fn config(&self) -> &MergePolicyConfig {
        &self.config
    }

    fn name(&self) -> &'static str {
        "no_merge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(docs: i32) -> SegmentMetadata {
        SegmentMetadata::new(0, docs, 0, docs.max(1) - 1).unwrap()
    }

    /// Merges the smallest segments whenever there are more than two.
    #[derive(Debug, Default)]
    struct SmallestFirstPolicy {
        config: MergePolicyConfig,
    }

    impl MergePolicy for SmallestFirstPolicy {
        fn find_merges(&self, segments: &[SegmentMetadata]) -> Result<Option<MergeSpec>> {
            if segments.len() <= 2 {
                return Ok(None);
            }
            let mut sorted = segments.to_vec();
            sorted.sort_by_key(|segment| segment.document_count());
            sorted.truncate(self.config.max_segments_merged_at_once);
            while sorted.len() > 2 && self.config.exceeds_max_docs(&sorted) {
                sorted.pop();
            }
            MergeSpec::with_generated_name(sorted).map(Some)
        }

        fn config(&self) -> &MergePolicyConfig {
            &self.config
        }

        fn name(&self) -> &'static str {
            "smallest_first"
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(MergePolicyConfig::default().validate().is_ok());
        assert!(MergePolicyConfig::new(2, MIN_SEGMENT_DOCS + 1).is_ok());
        assert!(matches!(
            MergePolicyConfig::new(1, 10_000),
            Err(TesseraError::InvalidConfig(_))
        ));
        assert!(matches!(
            MergePolicyConfig::new(4, MIN_SEGMENT_DOCS),
            Err(TesseraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_merge_spec_requires_two_segments() {
        assert!(MergeSpec::new(vec![meta(1)], "m").is_err());
        assert!(MergeSpec::new(vec![meta(1), meta(2)], "").is_err());

        let spec = MergeSpec::new(vec![meta(1), meta(2)], "merged").unwrap();
        assert_eq!(spec.merged_name(), "merged");
        assert_eq!(spec.total_documents(), 3);
    }

    #[test]
    fn test_generated_name() {
        let spec = MergeSpec::with_generated_name(vec![meta(1), meta(2), meta(3)]).unwrap();
        assert!(spec.merged_name().starts_with("m_3_"), "{}", spec.merged_name());
    }

    #[test]
    fn test_no_merge_policy() {
        let policy = NoMergePolicy::new();
        assert_eq!(policy.find_merges(&[meta(1), meta(2), meta(3)]).unwrap(), None);
        assert_eq!(policy.name(), "no_merge");

        let bad = MergePolicyConfig {
            max_segments_merged_at_once: 0,
            ..Default::default()
        };
        assert!(NoMergePolicy::with_config(bad).is_err());
    }

    #[test]
    fn test_custom_policy() {
        let policy = SmallestFirstPolicy::default();
        assert_eq!(policy.find_merges(&[meta(5), meta(1)]).unwrap(), None);

        let spec = policy
            .find_merges(&[meta(50), meta(3), meta(7)])
            .unwrap()
            .unwrap();
        assert_eq!(spec.segments().len(), 3);
        assert_eq!(spec.segments()[0].document_count(), 3);
        assert_eq!(spec.total_documents(), 60);
    }
}
