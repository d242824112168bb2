//! In-memory description of one committed segment.

use crate::document::DocId;
use crate::error::{Result, TesseraError};
use crate::segment::{FileKind, SegmentMetadata};
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{StorageInput, StorageOutput};

/// Prefix of every segment name; the rest is the segment number.
pub const SEGMENT_PREFIX: &str = "segment_";

/// Name, counters and size of a segment tracked by a [`SegmentSet`].
///
/// [`SegmentSet`]: crate::index::segments::SegmentSet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    name: String,
    creation_time: i64,
    document_count: i32,
    min_doc_id: DocId,
    max_doc_id: DocId,
    size_in_bytes: i64,
    deleted: bool,
}

impl SegmentDescriptor {
    /// Describe a freshly flushed segment. The size is unknown (-1) until
    /// [`SegmentDescriptor::set_size_in_bytes`] is called.
    pub fn new<S: Into<String>>(name: S, metadata: &SegmentMetadata) -> Self {
        SegmentDescriptor {
            name: name.into(),
            creation_time: metadata.creation_time(),
            document_count: metadata.document_count(),
            min_doc_id: metadata.min_doc_id(),
            max_doc_id: metadata.max_doc_id(),
            size_in_bytes: -1,
            deleted: false,
        }
    }

    /// Name of segment number `number`.
    pub fn segment_name(number: u64) -> String {
        format!("{SEGMENT_PREFIX}{number}")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn document_count(&self) -> i32 {
        self.document_count
    }

    pub fn min_doc_id(&self) -> DocId {
        self.min_doc_id
    }

    pub fn max_doc_id(&self) -> DocId {
        self.max_doc_id
    }

    /// Total bytes of the segment's files, or -1 if not yet known.
    pub fn size_in_bytes(&self) -> i64 {
        self.size_in_bytes
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Record the total size once every file is finalized.
    pub fn set_size_in_bytes(&mut self, size: u64) -> Result<()> {
        self.size_in_bytes = i64::try_from(size).map_err(|_| {
            TesseraError::invalid_argument(format!("segment size {size} exceeds i64 range"))
        })?;
        Ok(())
    }

    /// Flag the segment as superseded, e.g. by a merge.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Whether `doc_id` falls inside this segment's id range.
    pub fn contains_doc_id(&self, doc_id: DocId) -> bool {
        self.document_count > 0 && self.min_doc_id <= doc_id && doc_id <= self.max_doc_id
    }

    /// The numeric suffix of a `segment_N` name.
    pub fn segment_number(&self) -> Option<u64> {
        self.name.strip_prefix(SEGMENT_PREFIX)?.parse().ok()
    }

    /// Names of the segment's four files.
    pub fn file_names(&self) -> Vec<String> {
        FileKind::ALL
            .iter()
            .map(|kind| kind.file_name(&self.name))
            .collect()
    }

    pub(crate) fn write_to<W: StorageOutput>(&self, out: &mut StructWriter<W>) -> Result<()> {
        out.write_short_bytes(self.name.as_bytes())?;
        out.write_i64(self.creation_time)?;
        out.write_i32(self.document_count)?;
        out.write_i32(self.min_doc_id)?;
        out.write_i32(self.max_doc_id)?;
        out.write_i64(self.size_in_bytes)?;
        out.write_u8(self.deleted as u8)?;
        Ok(())
    }

    pub(crate) fn read_from<R: StorageInput>(input: &mut StructReader<R>) -> Result<Self> {
        let name = input.read_short_string()?;
        let creation_time = input.read_i64()?;
        let document_count = input.read_i32()?;
        let min_doc_id = input.read_i32()?;
        let max_doc_id = input.read_i32()?;
        let size_in_bytes = input.read_i64()?;
        let deleted = match input.read_u8()? {
            0 => false,
            1 => true,
            flag => {
                return Err(TesseraError::corruption(format!(
                    "segment {name}: invalid deleted flag {flag}"
                )));
            }
        };

        if name.is_empty() || document_count < 0 || size_in_bytes < -1 {
            return Err(TesseraError::corruption(format!(
                "invalid segment descriptor {name:?} ({document_count} docs, {size_in_bytes} bytes)"
            )));
        }

        Ok(SegmentDescriptor {
            name,
            creation_time,
            document_count,
            min_doc_id,
            max_doc_id,
            size_in_bytes,
            deleted,
        })
    }
}
