//! Write path of the index.
//!
//! [`IndexWriter`](writer::IndexWriter) buffers documents, turns each batch
//! into an immutable segment and registers it in the
//! [`SegmentSet`](segments::SegmentSet), which makes the set of live segments
//! durable through a generation file plus an atomically replaced pointer file.

pub mod config;
pub mod merge_policy;
pub mod segment;
pub mod segments;
pub mod writer;

pub use config::{IndexWriterConfig, IndexWriterConfigBuilder};
pub use merge_policy::{MergePolicy, MergePolicyConfig, MergeSpec, NoMergePolicy};
pub use segment::SegmentDescriptor;
pub use segments::SegmentSet;
pub use writer::{IndexWriter, WriterStats};
