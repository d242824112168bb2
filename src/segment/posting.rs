//! Posting list file (`.post`).
//!
//! Each call to [`PostingWriter::write_posting_list`] appends one list and
//! returns the offset it starts at; the term dictionary stores that offset.
//!
//! ```text
//! posting_count: u32
//! per posting (ascending doc id):
//!   delta_doc_id: u32 | frequency: u32 | position_count: u32 | position_delta: u32 *
//! ```
//!
//! The first doc id and the first position of each posting are stored as-is;
//! every later value is the difference from its predecessor.

use std::sync::Arc;

use crate::document::DocId;
use crate::error::{Result, TesseraError};
use crate::segment::file::{SegmentFileReader, SegmentFileWriter};
use crate::segment::header::{FileHeader, HEADER_SIZE};
use crate::segment::{FileKind, current_time_millis, to_u32};
use crate::storage::Storage;

/// Occurrences of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    doc_id: DocId,
    positions: Vec<u32>,
}

impl Posting {
    /// Create a posting. Positions are sorted; the frequency is their count.
    pub fn new(doc_id: DocId, mut positions: Vec<u32>) -> Result<Self> {
        if doc_id < 0 {
            return Err(TesseraError::invalid_argument(format!(
                "posting document id must be non-negative, got {doc_id}"
            )));
        }
        positions.sort_unstable();
        Ok(Posting { doc_id, positions })
    }

    /// Create a posting with an explicit frequency, which must equal the
    /// number of positions.
    pub fn with_frequency(doc_id: DocId, frequency: u32, positions: Vec<u32>) -> Result<Self> {
        if positions.len() as u64 != frequency as u64 {
            return Err(TesseraError::invalid_argument(format!(
                "frequency {frequency} does not match {} positions",
                positions.len()
            )));
        }
        Self::new(doc_id, positions)
    }

    /// The document id.
    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    /// Number of occurrences in the document.
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Ascending positions of each occurrence.
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }
}

/// Writes posting lists to a segment's `.post` file.
#[derive(Debug)]
pub struct PostingWriter {
    file: SegmentFileWriter,
    lists: u32,
}

impl PostingWriter {
    /// Create `{segment}.post`.
    pub fn create(storage: Arc<dyn Storage>, segment: &str) -> Result<Self> {
        Self::create_at(storage, segment, current_time_millis())
    }

    /// Create `{segment}.post` with an explicit header timestamp.
    pub fn create_at(storage: Arc<dyn Storage>, segment: &str, timestamp: i64) -> Result<Self> {
        Ok(PostingWriter {
            file: SegmentFileWriter::create(storage, segment, FileKind::Posting, timestamp)?,
            lists: 0,
        })
    }

    /// Append one posting list, sorted by document id, and return its offset.
    pub fn write_posting_list(&mut self, postings: &[Posting]) -> Result<u64> {
        let mut sorted: Vec<&Posting> = postings.iter().collect();
        sorted.sort_by_key(|posting| posting.doc_id);

        let offset = self.file.position();
        let out = self.file.out();
        out.write_u32(to_u32(sorted.len(), "posting count")?)?;

        let mut previous_doc = 0u32;
        for posting in sorted {
            let doc_id = posting.doc_id as u32;
            out.write_u32(doc_id - previous_doc)?;
            out.write_u32(posting.frequency())?;
            out.write_u32(posting.frequency())?;

            let mut previous_position = 0u32;
            for &position in &posting.positions {
                out.write_u32(position - previous_position)?;
                previous_position = position;
            }
            previous_doc = doc_id;
        }

        self.lists += 1;
        Ok(offset)
    }

    /// Number of lists written so far.
    pub fn list_count(&self) -> u32 {
        self.lists
    }

    /// Finish the file and reopen it for reading.
    pub fn complete(self) -> Result<PostingReader> {
        PostingReader::from_file(self.file.complete(self.lists)?)
    }
}

/// Reads posting lists from a segment's `.post` file.
#[derive(Debug)]
pub struct PostingReader {
    file: SegmentFileReader,
}

impl PostingReader {
    /// Open `{segment}.post`.
    pub fn open(storage: &dyn Storage, segment: &str) -> Result<Self> {
        let name = FileKind::Posting.file_name(segment);
        Self::from_file(SegmentFileReader::open(storage, &name, FileKind::Posting)?)
    }

    /// Wrap an already opened file, positioned at the first list.
    pub fn from_file(mut file: SegmentFileReader) -> Result<Self> {
        if file.header().kind != FileKind::Posting {
            return Err(TesseraError::invalid_header(
                file.name(),
                format!("expected post file, found {}", file.header().kind),
            ));
        }
        file.seek_to_data()?;
        Ok(PostingReader { file })
    }

    /// The validated header.
    pub fn header(&self) -> &FileHeader {
        self.file.header()
    }

    /// Number of lists in the file.
    pub fn list_count(&self) -> u32 {
        self.file.header().record_count
    }

    /// Move to a list offset returned by [`PostingWriter::write_posting_list`].
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset < HEADER_SIZE as u64 || offset >= self.file.size() {
            return Err(TesseraError::invalid_argument(format!(
                "posting offset {offset} outside {}..{} of {}",
                HEADER_SIZE,
                self.file.size(),
                self.file.name()
            )));
        }
        self.file.seek(offset)
    }

    /// Read the list starting at `offset`.
    pub fn read_posting_list_at(&mut self, offset: u64) -> Result<Vec<Posting>> {
        self.seek(offset)?;
        self.read_posting_list()
    }

    /// Read the list at the current position.
    pub fn read_posting_list(&mut self) -> Result<Vec<Posting>> {
        let name = self.file.name().to_string();
        let input = self.file.input()?;
        let start = input.position();

        let count = input.read_u32()?;
        // Smallest encoded posting is three u32s.
        if count as u64 * 12 > input.remaining() {
            return Err(TesseraError::corruption(format!(
                "{name}: posting count {count} at {start} exceeds file size"
            )));
        }

        let mut postings = Vec::with_capacity(count as usize);
        let mut doc_id = 0u32;
        for i in 0..count {
            let delta = input.read_u32()?;
            doc_id = if i == 0 {
                delta
            } else {
                doc_id.checked_add(delta).ok_or_else(|| {
                    TesseraError::corruption(format!("{name}: doc id overflow in list at {start}"))
                })?
            };
            let frequency = input.read_u32()?;
            let position_count = input.read_u32()?;
            if position_count != frequency {
                return Err(TesseraError::corruption(format!(
                    "{name}: frequency {frequency} but {position_count} positions for doc {doc_id}"
                )));
            }
            if position_count as u64 * 4 > input.remaining() {
                return Err(TesseraError::corruption(format!(
                    "{name}: {position_count} positions for doc {doc_id} exceed file size"
                )));
            }

            let mut positions = Vec::with_capacity(position_count as usize);
            let mut position = 0u32;
            for _ in 0..position_count {
                position = position.checked_add(input.read_u32()?).ok_or_else(|| {
                    TesseraError::corruption(format!("{name}: position overflow for doc {doc_id}"))
                })?;
                positions.push(position);
            }

            let doc_id = DocId::try_from(doc_id).map_err(|_| {
                TesseraError::corruption(format!("{name}: doc id {doc_id} out of range"))
            })?;
            postings.push(Posting { doc_id, positions });
        }

        Ok(postings)
    }

    /// Release the file handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }
}
