//! Read access to one complete segment.

use crate::document::Document;
use crate::error::Result;
use crate::segment::dictionary::{Term, TermDictionaryReader};
use crate::segment::document::DocumentReader;
use crate::segment::meta::{MetaReader, SegmentMetadata};
use crate::segment::posting::{Posting, PostingReader};
use crate::storage::Storage;

/// Opens the four files of a segment and verifies its metadata.
#[derive(Debug)]
pub struct SegmentReader {
    name: String,
    metadata: SegmentMetadata,
    documents: DocumentReader,
    postings: PostingReader,
    dictionary: TermDictionaryReader,
}

impl SegmentReader {
    /// Open segment `name`.
    pub fn open(storage: &dyn Storage, name: &str) -> Result<Self> {
        let mut meta = MetaReader::open(storage, name)?;
        let metadata = meta.read()?;
        meta.close()?;

        Ok(SegmentReader {
            name: name.to_string(),
            metadata,
            documents: DocumentReader::open(storage, name)?,
            postings: PostingReader::open(storage, name)?,
            dictionary: TermDictionaryReader::open(storage, name)?,
        })
    }

    /// The segment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The checksum-verified metadata.
    pub fn metadata(&self) -> &SegmentMetadata {
        &self.metadata
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> u32 {
        self.dictionary.term_count()
    }

    /// Look up a term in the dictionary.
    pub fn find_term(&mut self, field: &str, text: &str) -> Result<Option<Term>> {
        self.dictionary.find_term(field, text)
    }

    /// Posting list of `(field, text)`; empty if the term is absent.
    pub fn postings(&mut self, field: &str, text: &str) -> Result<Vec<Posting>> {
        match self.dictionary.find_term(field, text)? {
            Some(term) => self.postings.read_posting_list_at(term.posting_offset()),
            None => Ok(Vec::new()),
        }
    }

    /// All terms in sorted order.
    pub fn terms(&mut self) -> Result<Vec<Term>> {
        self.dictionary.terms()
    }

    /// Read the stored document whose record starts at `offset`.
    pub fn document_at(&mut self, offset: u64) -> Result<Document> {
        self.documents.read_document_at(offset)
    }

    /// All stored documents in write order.
    pub fn documents(&mut self) -> Result<Vec<Document>> {
        self.documents.read_all()
    }

    /// Release all file handles. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.documents.close()?;
        self.postings.close()?;
        self.dictionary.close()
    }
}
