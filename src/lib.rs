//! # Tessera
//!
//! A small segment-based index storage engine.
//!
//! ## Features
//!
//! - Immutable segments of four self-describing binary files
//! - Delta-encoded posting lists with term positions
//! - Sorted term dictionary with a block index for lookups
//! - Checksummed segment metadata
//! - Crash-safe commits through generation files and atomic renames
//! - Pluggable storage backends, analyzers and merge policies
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tessera::prelude::*;
//!
//! # fn main() -> tessera::error::Result<()> {
//! let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
//! let config = IndexWriterConfig::builder()
//!     .analyzer(Arc::new(StandardAnalyzer::new()))
//!     .merge_policy(Arc::new(NoMergePolicy::new()))
//!     .max_buffered_docs(2)
//!     .build()?;
//!
//! let mut writer = IndexWriter::new(Arc::clone(&storage), config)?;
//! writer.add_document(Document::builder(0).add_text("content", "First document").build())?;
//! writer.add_document(Document::builder(1).add_text("content", "Second document").build())?;
//! writer.commit()?;
//!
//! let mut segment = SegmentReader::open(storage.as_ref(), "segment_0")?;
//! assert_eq!(segment.postings("content", "document")?.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod document;
pub mod error;
pub mod index;
pub mod segment;
pub mod storage;

pub mod prelude {
    pub use crate::analysis::{Analyzer, StandardAnalyzer, WhitespaceAnalyzer};
    pub use crate::document::{DocId, Document, FieldValue};
    pub use crate::error::{ErrorKind, Result, TesseraError};
    pub use crate::index::{IndexWriter, IndexWriterConfig, MergePolicy, NoMergePolicy, SegmentSet};
    pub use crate::segment::{SegmentMetadata, SegmentReader};
    pub use crate::storage::Storage;
    pub use crate::storage::file::FileStorage;
    pub use crate::storage::memory::MemoryStorage;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
