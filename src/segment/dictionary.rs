//! Term dictionary file (`.dic`).
//!
//! Layout after the common header:
//!
//! ```text
//! descriptor: records_start: u64 | index_start: u64 | block_count: u32
//! records:    (field_len: u16, field, text_len: u16, text, doc_freq: u32, posting_offset: u64) *
//! index:      block_count: u32 | entry_offset: u64 * block_count | entry *
//! entry:      field_len: u16, field | prefix_len: u16, prefix | record_position: u64
//! ```
//!
//! Records are sorted by `(field, text)`. Every [`BLOCK_SIZE`] records start a
//! block; the index holds one entry per block with the first term's field, the
//! first [`PREFIX_LENGTH`] bytes of its text and the record's absolute
//! position. Entry offsets are relative to `index_start`.
//!
//! Lookup binary-searches the entries for the last block whose key is strictly
//! below the query key and scans forward from there. Truncated prefixes are
//! monotone in the full term order, so every term equal to the query lies at or
//! after that block even when neighbouring blocks share a prefix.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Result, TesseraError};
use crate::segment::file::{SegmentFileReader, SegmentFileWriter};
use crate::segment::header::{FileHeader, HEADER_SIZE};
use crate::segment::{FileKind, current_time_millis, to_u32};
use crate::storage::Storage;

/// Number of consecutive term records per index block.
pub const BLOCK_SIZE: usize = 128;

/// Bytes of term text kept in each index entry.
pub const PREFIX_LENGTH: usize = 8;

const DESCRIPTOR_SIZE: u64 = 8 + 8 + 4;

/// A `(field, text)` key plus the facts the dictionary records about it.
///
/// Equality, hashing and ordering only look at `field` and `text`.
#[derive(Debug, Clone)]
pub struct Term {
    field: String,
    text: String,
    document_frequency: u32,
    posting_offset: u64,
}

impl Term {
    /// Create a term with no recorded postings.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        Self::with_postings(field, text, 0, 0)
    }

    /// Create a term with its document frequency and posting list offset.
    pub fn with_postings<F: Into<String>, T: Into<String>>(
        field: F,
        text: T,
        document_frequency: u32,
        posting_offset: u64,
    ) -> Self {
        Term {
            field: field.into(),
            text: text.into(),
            document_frequency,
            posting_offset,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of documents containing the term.
    pub fn document_frequency(&self) -> u32 {
        self.document_frequency
    }

    /// Offset of the term's posting list in the segment's `.post` file.
    pub fn posting_offset(&self) -> u64 {
        self.posting_offset
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.text == other.text
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.hash(state);
        self.text.hash(state);
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.field
            .cmp(&other.field)
            .then_with(|| self.text.cmp(&other.text))
    }
}

fn prefix(text: &str) -> &[u8] {
    let bytes = text.as_bytes();
    &bytes[..bytes.len().min(PREFIX_LENGTH)]
}

fn compare_key(field: &str, text: &[u8], query_field: &str, query_text: &[u8]) -> Ordering {
    field
        .as_bytes()
        .cmp(query_field.as_bytes())
        .then_with(|| text.cmp(query_text))
}

struct BlockEntry {
    field: String,
    prefix: Vec<u8>,
    record_position: u64,
}

/// Writes a segment's `.dic` file.
///
/// Terms must arrive in strictly ascending `(field, text)` order through
/// [`TermDictionaryWriter::add_term`]; [`TermDictionaryWriter::add_terms`]
/// sorts a batch first.
pub struct TermDictionaryWriter {
    file: SegmentFileWriter,
    last: Option<Term>,
    blocks: Vec<BlockEntry>,
    count: u32,
}

impl TermDictionaryWriter {
    /// Create `{segment}.dic`.
    pub fn create(storage: Arc<dyn Storage>, segment: &str) -> Result<Self> {
        Self::create_at(storage, segment, current_time_millis())
    }

    /// Create `{segment}.dic` with an explicit header timestamp.
    pub fn create_at(storage: Arc<dyn Storage>, segment: &str, timestamp: i64) -> Result<Self> {
        let mut file = SegmentFileWriter::create(storage, segment, FileKind::Dictionary, timestamp)?;
        // Descriptor placeholder, patched by complete().
        let out = file.out();
        out.write_u64(0)?;
        out.write_u64(0)?;
        out.write_u32(0)?;

        Ok(TermDictionaryWriter {
            file,
            last: None,
            blocks: Vec::new(),
            count: 0,
        })
    }

    /// Append one term record.
    pub fn add_term(&mut self, term: Term) -> Result<()> {
        if let Some(last) = &self.last
            && term <= *last
        {
            return Err(TesseraError::invalid_argument(format!(
                "term {}:{} is not after {}:{}",
                term.field, term.text, last.field, last.text
            )));
        }

        let position = self.file.position();
        if self.count as usize % BLOCK_SIZE == 0 {
            self.blocks.push(BlockEntry {
                field: term.field.clone(),
                prefix: prefix(&term.text).to_vec(),
                record_position: position,
            });
        }

        let out = self.file.out();
        out.write_short_bytes(term.field.as_bytes())?;
        out.write_short_bytes(term.text.as_bytes())?;
        out.write_u32(term.document_frequency)?;
        out.write_u64(term.posting_offset)?;

        self.count += 1;
        self.last = Some(term);
        Ok(())
    }

    /// Sort `terms` and append them. Duplicate keys are rejected.
    pub fn add_terms<I: IntoIterator<Item = Term>>(&mut self, terms: I) -> Result<()> {
        let mut terms: Vec<Term> = terms.into_iter().collect();
        terms.sort();
        terms.into_iter().try_for_each(|term| self.add_term(term))
    }

    /// Number of terms written so far.
    pub fn term_count(&self) -> u32 {
        self.count
    }

    /// Write the block index, patch the descriptor and reopen for reading.
    pub fn complete(mut self) -> Result<TermDictionaryReader> {
        let records_start = HEADER_SIZE as u64 + DESCRIPTOR_SIZE;
        let index_start = self.file.position();
        let block_count = to_u32(self.blocks.len(), "block count")?;

        let out = self.file.out();
        out.write_u32(block_count)?;
        let offsets_start = out.position();
        for _ in &self.blocks {
            out.write_u64(0)?;
        }

        let mut entry_offsets = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            entry_offsets.push(out.position() - index_start);
            out.write_short_bytes(block.field.as_bytes())?;
            out.write_short_bytes(&block.prefix)?;
            out.write_u64(block.record_position)?;
        }

        out.seek(offsets_start)?;
        for offset in entry_offsets {
            out.write_u64(offset)?;
        }

        out.seek(HEADER_SIZE as u64)?;
        out.write_u64(records_start)?;
        out.write_u64(index_start)?;
        out.write_u32(block_count)?;
        out.seek_to_end()?;

        TermDictionaryReader::from_file(self.file.complete(self.count)?)
    }
}

impl std::fmt::Debug for TermDictionaryWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermDictionaryWriter")
            .field("file", &self.file)
            .field("terms", &self.count)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

/// Reads a segment's `.dic` file.
#[derive(Debug)]
pub struct TermDictionaryReader {
    file: SegmentFileReader,
    records_start: u64,
    index_start: u64,
    block_count: u32,
}

impl TermDictionaryReader {
    /// Open `{segment}.dic`.
    pub fn open(storage: &dyn Storage, segment: &str) -> Result<Self> {
        let name = FileKind::Dictionary.file_name(segment);
        Self::from_file(SegmentFileReader::open(storage, &name, FileKind::Dictionary)?)
    }

    /// Wrap an already opened file and read its descriptor.
    pub fn from_file(mut file: SegmentFileReader) -> Result<Self> {
        if file.header().kind != FileKind::Dictionary {
            return Err(TesseraError::invalid_header(
                file.name(),
                format!("expected dic file, found {}", file.header().kind),
            ));
        }

        file.seek_to_data()?;
        let input = file.input()?;
        let records_start = input.read_u64()?;
        let index_start = input.read_u64()?;
        let block_count = input.read_u32()?;

        let expected_blocks = (file.header().record_count as u64).div_ceil(BLOCK_SIZE as u64);
        if records_start != HEADER_SIZE as u64 + DESCRIPTOR_SIZE
            || index_start < records_start
            || index_start + 4 + block_count as u64 * 8 > file.size()
            || block_count as u64 != expected_blocks
        {
            return Err(TesseraError::corruption(format!(
                "{}: inconsistent descriptor (records {records_start}, index {index_start}, \
                 {block_count} blocks for {} terms)",
                file.name(),
                file.header().record_count
            )));
        }

        Ok(TermDictionaryReader {
            file,
            records_start,
            index_start,
            block_count,
        })
    }

    /// The validated header.
    pub fn header(&self) -> &FileHeader {
        self.file.header()
    }

    /// Number of terms in the dictionary.
    pub fn term_count(&self) -> u32 {
        self.file.header().record_count
    }

    /// Number of index blocks.
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Look up `(field, text)`. Returns `None` if the term is absent.
    pub fn find_term(&mut self, field: &str, text: &str) -> Result<Option<Term>> {
        if self.block_count == 0 {
            return Ok(None);
        }

        let query_prefix = prefix(text);
        let mut low = 0u32;
        let mut high = self.block_count;
        while low < high {
            let mid = low + (high - low) / 2;
            let entry = self.read_block_entry(mid)?;
            if compare_key(&entry.field, &entry.prefix, field, query_prefix) == Ordering::Less {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        let block = low.saturating_sub(1);
        let start = self.read_block_entry(block)?.record_position;

        self.file.seek(start)?;
        while self.file.position() < self.index_start {
            let term = self.read_record()?;
            match compare_key(&term.field, term.text.as_bytes(), field, text.as_bytes()) {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(Some(term)),
                Ordering::Greater => return Ok(None),
            }
        }

        Ok(None)
    }

    /// Read every term in sorted order.
    pub fn terms(&mut self) -> Result<Vec<Term>> {
        self.file.seek(self.records_start)?;
        let mut terms = Vec::with_capacity(self.term_count() as usize);
        while self.file.position() < self.index_start {
            terms.push(self.read_record()?);
        }
        Ok(terms)
    }

    fn read_block_entry(&mut self, block: u32) -> Result<BlockEntry> {
        let index_start = self.index_start;
        self.file.seek(index_start + 4 + block as u64 * 8)?;
        let input = self.file.input()?;
        let offset = input.read_u64()?;

        input.seek(index_start + offset)?;
        let field = input.read_short_string()?;
        let prefix = input.read_short_bytes()?;
        let record_position = input.read_u64()?;

        if record_position < self.records_start || record_position >= index_start {
            return Err(TesseraError::corruption(format!(
                "{}: block {block} points at {record_position}, outside the term records",
                self.file.name()
            )));
        }

        Ok(BlockEntry {
            field,
            prefix,
            record_position,
        })
    }

    fn read_record(&mut self) -> Result<Term> {
        let input = self.file.input()?;
        let field = input.read_short_string()?;
        let text = input.read_short_string()?;
        let document_frequency = input.read_u32()?;
        let posting_offset = input.read_u64()?;

        Ok(Term {
            field,
            text,
            document_frequency,
            posting_offset,
        })
    }

    /// Release the file handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }
}
