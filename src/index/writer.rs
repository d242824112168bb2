//! Index writer.
//!
//! Documents are buffered in memory. When the buffer reaches
//! `max_buffered_docs`, or on an explicit [`IndexWriter::flush`], the batch is
//! analyzed and written as a new segment; [`IndexWriter::commit`] makes every
//! flushed segment durable through the [`SegmentSet`] commit protocol.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use log::{debug, info, warn};

use crate::document::{DocId, Document};
use crate::error::{Result, TesseraError};
use crate::index::config::IndexWriterConfig;
use crate::index::merge_policy::MergeSpec;
use crate::index::segment::SegmentDescriptor;
use crate::index::segments::SegmentSet;
use crate::segment::{
    DocumentWriter, FileKind, MetaReader, MetaWriter, Posting, PostingWriter, SegmentMetadata,
    Term, TermDictionaryWriter, to_u32,
};
use crate::storage::Storage;

/// `(field, text) -> doc id -> positions`
type InvertedBatch = AHashMap<(String, String), AHashMap<DocId, Vec<u32>>>;

/// Statistics about the writing process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Number of documents accepted by `add_document`.
    pub docs_added: u64,
    /// Number of segments written.
    pub segments_flushed: u64,
    /// Number of successful commits.
    pub commits: u64,
    /// Number of flushes that failed and were cleaned up.
    pub failed_flushes: u64,
}

/// Buffers documents and writes them as immutable segments.
///
/// One writer owns an index directory at a time. Dropping a writer does not
/// commit; call [`IndexWriter::commit`] or [`IndexWriter::close`].
pub struct IndexWriter {
    storage: Arc<dyn Storage>,
    config: IndexWriterConfig,
    segments: SegmentSet,
    buffer: Vec<Document>,
    buffered_ids: AHashSet<DocId>,
    next_segment: u64,
    closed: bool,
    stats: WriterStats,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("config", &self.config)
            .field("generation", &self.segments.generation())
            .field("segments", &self.segments.len())
            .field("buffered_docs", &self.buffer.len())
            .field("next_segment", &self.next_segment)
            .field("closed", &self.closed)
            .field("stats", &self.stats)
            .finish()
    }
}

impl IndexWriter {
    /// Open a writer over `storage`, continuing from its latest commit.
    pub fn new(storage: Arc<dyn Storage>, config: IndexWriterConfig) -> Result<Self> {
        let segments = SegmentSet::read_latest(storage.as_ref())?;
        let next_segment = segments.next_segment_number();
        debug!(
            "Opened index at generation {} with {} segments",
            segments.generation(),
            segments.len()
        );

        Ok(IndexWriter {
            storage,
            config,
            segments,
            buffer: Vec::new(),
            buffered_ids: AHashSet::new(),
            next_segment,
            closed: false,
            stats: WriterStats::default(),
        })
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(TesseraError::invalid_operation("Writer is closed"))
        } else {
            Ok(())
        }
    }

    /// Buffer a document, flushing once the buffer is full.
    ///
    /// Ids must be non-negative and unique within the current buffer.
    pub fn add_document(&mut self, document: Document) -> Result<()> {
        self.check_closed()?;

        let id = document.id();
        if id < 0 {
            return Err(TesseraError::invalid_argument(format!(
                "document id must be non-negative, got {id}"
            )));
        }
        if !self.buffered_ids.insert(id) {
            return Err(TesseraError::invalid_argument(format!(
                "document {id} is already buffered"
            )));
        }

        self.buffer.push(document);
        self.stats.docs_added += 1;

        if self.buffer.len() >= self.config.max_buffered_docs() {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the buffered documents as a new segment. No-op when empty.
    ///
    /// The buffer is cleared whether or not the flush succeeds. On failure
    /// every file of the new segment is removed and the error names it.
    pub fn flush(&mut self) -> Result<()> {
        self.check_closed()?;
        if self.buffer.is_empty() {
            return Ok(());
        }

        let documents = std::mem::take(&mut self.buffer);
        self.buffered_ids.clear();
        let segment = SegmentDescriptor::segment_name(self.next_segment);

        match self.write_segment(&segment, &documents) {
            Ok(descriptor) => {
                info!(
                    "Flushed {} with {} documents ({} bytes)",
                    segment,
                    descriptor.document_count(),
                    descriptor.size_in_bytes()
                );
                self.segments.add(descriptor);
                self.next_segment += 1;
                self.stats.segments_flushed += 1;
                Ok(())
            }
            Err(err) => {
                self.discard_segment(&segment);
                self.stats.failed_flushes += 1;
                Err(TesseraError::flush(segment, err))
            }
        }
    }

    fn write_segment(&self, segment: &str, documents: &[Document]) -> Result<SegmentDescriptor> {
        let metadata = SegmentMetadata::for_doc_ids(documents.iter().map(Document::id))?;
        let batch = self.invert(documents)?;
        let timestamp = metadata.creation_time();

        let mut doc_writer = DocumentWriter::create_at(Arc::clone(&self.storage), segment, timestamp)?;
        for document in documents {
            doc_writer.write_document(document)?;
        }
        doc_writer.complete()?.close()?;

        let mut entries: Vec<_> = batch.into_iter().collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

        let mut post_writer = PostingWriter::create_at(Arc::clone(&self.storage), segment, timestamp)?;
        let mut terms = Vec::with_capacity(entries.len());
        for ((field, text), occurrences) in entries {
            let postings = occurrences
                .into_iter()
                .map(|(doc_id, positions)| Posting::new(doc_id, positions))
                .collect::<Result<Vec<_>>>()?;
            let offset = post_writer.write_posting_list(&postings)?;
            let frequency = to_u32(postings.len(), "document frequency")?;
            terms.push(Term::with_postings(field, text, frequency, offset));
        }
        post_writer.complete()?.close()?;

        let mut dic_writer =
            TermDictionaryWriter::create_at(Arc::clone(&self.storage), segment, timestamp)?;
        for term in terms {
            dic_writer.add_term(term)?;
        }
        dic_writer.complete()?.close()?;

        let mut meta_writer = MetaWriter::create_at(Arc::clone(&self.storage), segment, timestamp)?;
        meta_writer.write(&metadata)?;
        meta_writer.complete()?.close()?;

        let size = FileKind::ALL
            .iter()
            .map(|kind| self.storage.file_size(&kind.file_name(segment)))
            .sum::<Result<u64>>()?;
        let mut descriptor = SegmentDescriptor::new(segment, &metadata);
        descriptor.set_size_in_bytes(size)?;
        Ok(descriptor)
    }

    /// Run the analyzer over every text field. Positions are token start
    /// offsets; numeric and binary fields are stored but not indexed.
    fn invert(&self, documents: &[Document]) -> Result<InvertedBatch> {
        let analyzer = self.config.analyzer();
        let mut batch = InvertedBatch::new();

        for document in documents {
            for (field, text) in document.text_fields() {
                for token in analyzer.analyze(text)? {
                    let position = to_u32(token.start_offset, "token offset")?;
                    batch
                        .entry((field.to_string(), token.text))
                        .or_default()
                        .entry(document.id())
                        .or_default()
                        .push(position);
                }
            }
        }
        Ok(batch)
    }

    fn discard_segment(&self, segment: &str) {
        for kind in FileKind::ALL {
            let name = kind.file_name(segment);
            if self.storage.file_exists(&name)
                && let Err(err) = self.storage.delete_file(&name)
            {
                warn!("Failed to delete {name} after failed flush: {err}");
            }
        }
    }

    /// Flush, then durably record every flushed segment as a new generation.
    pub fn commit(&mut self) -> Result<()> {
        self.check_closed()?;
        self.flush()?;
        self.segments.write(self.storage.as_ref())?;
        self.stats.commits += 1;
        Ok(())
    }

    /// Commit and release the storage. The storage is released even when
    /// the commit fails; the commit error is returned. Closing twice is a
    /// no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let committed = self.commit();
        self.closed = true;
        let released = self.storage.close();
        committed.and(released)
    }

    /// Ask the merge policy about the live segments. The proposal is
    /// returned, never executed.
    pub fn find_merges(&self) -> Result<Option<MergeSpec>> {
        self.check_closed()?;

        let metadata = self
            .segments
            .live_segments()
            .map(|segment| -> Result<SegmentMetadata> {
                let mut reader = MetaReader::open(self.storage.as_ref(), segment.name())?;
                let metadata = reader.read()?;
                reader.close()?;
                Ok(metadata)
            })
            .collect::<Result<Vec<_>>>()?;

        self.config.merge_policy().find_merges(&metadata)
    }

    /// Number of documents waiting for the next flush.
    pub fn buffered_docs(&self) -> usize {
        self.buffer.len()
    }

    /// Segments flushed so far, committed or not.
    pub fn segment_set(&self) -> &SegmentSet {
        &self.segments
    }

    pub fn config(&self) -> &IndexWriterConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{StandardAnalyzer, WhitespaceAnalyzer};
    use crate::error::ErrorKind;
    use crate::index::merge_policy::{MergePolicy, MergePolicyConfig, NoMergePolicy};
    use crate::segment::SegmentReader;
    use crate::storage::memory::MemoryStorage;

    fn config(max_buffered_docs: usize) -> IndexWriterConfig {
        IndexWriterConfig::new(
            Arc::new(StandardAnalyzer::new()),
            Arc::new(NoMergePolicy::new()),
            max_buffered_docs,
        )
        .unwrap()
    }

    fn text_doc(id: DocId, text: &str) -> Document {
        Document::builder(id).add_text("content", text).build()
    }

    #[test]
    fn test_flush_writes_searchable_segment() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = IndexWriter::new(Arc::clone(&storage), config(100)).unwrap();

        writer.add_document(text_doc(3, "the quick fox")).unwrap();
        writer
            .add_document(
                Document::builder(8)
                    .add_text("content", "the lazy dog, the end")
                    .add_numeric("year", 2024)
                    .build(),
            )
            .unwrap();
        assert_eq!(writer.buffered_docs(), 2);
        writer.flush().unwrap();
        assert_eq!(writer.buffered_docs(), 0);

        let mut reader = SegmentReader::open(storage.as_ref(), "segment_0").unwrap();
        assert_eq!(reader.metadata().document_count(), 2);
        assert_eq!(reader.metadata().min_doc_id(), 3);
        assert_eq!(reader.metadata().max_doc_id(), 8);

        let the = reader.postings("content", "the").unwrap();
        assert_eq!(the.len(), 2);
        assert_eq!(the[0].doc_id(), 3);
        assert_eq!(the[0].positions(), &[0]);
        assert_eq!(the[1].doc_id(), 8);
        assert_eq!(the[1].positions(), &[0, 14]);

        assert_eq!(reader.find_term("content", "the").unwrap().unwrap().document_frequency(), 2);
        assert!(reader.find_term("year", "2024").unwrap().is_none());
        assert_eq!(reader.documents().unwrap()[1].get_field("year").unwrap().as_numeric(), Some(2024));

        let size = writer.segment_set().segments()[0].size_in_bytes();
        assert!(size > 0);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = IndexWriter::new(Arc::clone(&storage), config(10)).unwrap();
        writer.flush().unwrap();
        assert!(storage.list_files().unwrap().is_empty());
        assert_eq!(writer.stats().segments_flushed, 0);
    }

    #[test]
    fn test_document_without_tokens() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = IndexWriter::new(Arc::clone(&storage), config(10)).unwrap();
        writer.add_document(text_doc(0, "  ,;  ")).unwrap();
        writer.add_document(Document::builder(1).add_binary("blob", vec![1, 2]).build()).unwrap();
        writer.flush().unwrap();

        let mut reader = SegmentReader::open(storage.as_ref(), "segment_0").unwrap();
        assert_eq!(reader.term_count(), 0);
        assert_eq!(reader.documents().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_documents_rejected_before_buffering() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = IndexWriter::new(storage, config(10)).unwrap();

        let err = writer.add_document(text_doc(-1, "x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        writer.add_document(text_doc(4, "x")).unwrap();
        assert!(writer.add_document(text_doc(4, "y")).is_err());
        assert_eq!(writer.buffered_docs(), 1);
        assert_eq!(writer.stats().docs_added, 1);
    }

    #[test]
    fn test_closed_writer_rejects_operations() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = IndexWriter::new(Arc::clone(&storage), config(10)).unwrap();
        writer.add_document(text_doc(1, "hello")).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();

        assert!(writer.is_closed());
        assert!(storage.is_closed());
        let err = writer.add_document(text_doc(2, "again")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
        assert_eq!(writer.commit().unwrap_err().kind(), ErrorKind::Closed);
    }

    #[test]
    fn test_close_commits_buffer() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = IndexWriter::new(Arc::clone(&storage), config(10)).unwrap();
        writer.add_document(text_doc(1, "hello")).unwrap();
        writer.close().unwrap();

        assert_eq!(writer.stats().commits, 1);
        assert_eq!(writer.segment_set().generation(), 0);
    }

    #[test]
    fn test_find_merges_passes_live_metadata() {
        #[derive(Debug, Default)]
        struct MergeEverything {
            config: MergePolicyConfig,
        }

        impl MergePolicy for MergeEverything {
            fn find_merges(&self, segments: &[SegmentMetadata]) -> Result<Option<MergeSpec>> {
                if segments.len() < 2 {
                    return Ok(None);
                }
                MergeSpec::with_generated_name(segments.to_vec()).map(Some)
            }

            fn config(&self) -> &MergePolicyConfig {
                &self.config
            }

            fn name(&self) -> &'static str {
                "merge_everything"
            }
        }

        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let config = IndexWriterConfig::new(
            Arc::new(WhitespaceAnalyzer::new()),
            Arc::new(MergeEverything::default()),
            1,
        )
        .unwrap();
        let mut writer = IndexWriter::new(storage, config).unwrap();

        writer.add_document(text_doc(0, "a")).unwrap();
        assert_eq!(writer.find_merges().unwrap(), None);

        writer.add_document(text_doc(1, "b")).unwrap();
        writer.add_document(text_doc(2, "c")).unwrap();
        let spec = writer.find_merges().unwrap().unwrap();
        assert_eq!(spec.segments().len(), 3);
        assert_eq!(spec.total_documents(), 3);
        assert!(spec.merged_name().starts_with("m_3_"));
    }
}
