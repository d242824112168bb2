//! Segment metadata file (`.meta`).
//!
//! The header is followed by one 32-byte record:
//!
//! ```text
//! creation_time: i64 | document_count: i32 | min_doc_id: i32 | max_doc_id: i32 | checksum: i64 | reserved: u32
//! ```
//!
//! `checksum` is the CRC-32 of the big-endian bytes of the first four fields.
//! It is recomputed on every read; any mismatch is reported as
//! [`TesseraError::CorruptMetadata`].

use std::sync::Arc;

use crate::document::DocId;
use crate::error::{Result, TesseraError};
use crate::segment::file::{SegmentFileReader, SegmentFileWriter};
use crate::segment::header::FileHeader;
use crate::segment::{FileKind, current_time_millis};
use crate::storage::Storage;

/// Encoded size of a metadata record.
pub const RECORD_SIZE: u64 = 32;

/// Segment-level counters guarded by a checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentMetadata {
    creation_time: i64,
    document_count: i32,
    min_doc_id: DocId,
    max_doc_id: DocId,
    checksum: i64,
}

impl SegmentMetadata {
    /// Validate the counters and compute the checksum.
    pub fn new(
        creation_time: i64,
        document_count: i32,
        min_doc_id: DocId,
        max_doc_id: DocId,
    ) -> Result<Self> {
        validate(document_count, min_doc_id, max_doc_id).map_err(TesseraError::InvalidArgument)?;

        Ok(SegmentMetadata {
            creation_time,
            document_count,
            min_doc_id,
            max_doc_id,
            checksum: checksum(creation_time, document_count, min_doc_id, max_doc_id),
        })
    }

    /// Metadata for a batch of document ids, created now.
    pub fn for_doc_ids<I: IntoIterator<Item = DocId>>(doc_ids: I) -> Result<Self> {
        let mut count = 0i64;
        let mut min = DocId::MAX;
        let mut max = DocId::MIN;
        for id in doc_ids {
            count += 1;
            min = min.min(id);
            max = max.max(id);
        }
        if count == 0 {
            return Self::new(current_time_millis(), 0, 0, 0);
        }

        let count = i32::try_from(count).map_err(|_| {
            TesseraError::invalid_argument(format!("{count} documents exceed i32 range"))
        })?;
        Self::new(current_time_millis(), count, min, max)
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

    pub fn checksum(&self) -> i64 {
        self.checksum
    }
}

fn validate(document_count: i32, min_doc_id: DocId, max_doc_id: DocId) -> std::result::Result<(), String> {
    if document_count < 0 {
        return Err(format!("document count must be non-negative, got {document_count}"));
    }
    if min_doc_id > max_doc_id {
        return Err(format!(
            "min doc id {min_doc_id} is greater than max doc id {max_doc_id}"
        ));
    }
    if document_count > 0 && min_doc_id < 0 {
        return Err(format!(
            "min doc id must be non-negative for a non-empty segment, got {min_doc_id}"
        ));
    }
    let span = max_doc_id as i64 - min_doc_id as i64 + 1;
    if document_count as i64 > span {
        return Err(format!(
            "{document_count} documents cannot fit in id range {min_doc_id}..={max_doc_id}"
        ));
    }
    Ok(())
}

fn checksum(creation_time: i64, document_count: i32, min_doc_id: DocId, max_doc_id: DocId) -> i64 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&creation_time.to_be_bytes());
    hasher.update(&document_count.to_be_bytes());
    hasher.update(&min_doc_id.to_be_bytes());
    hasher.update(&max_doc_id.to_be_bytes());
    hasher.finalize() as i64
}

/// Writes a segment's `.meta` file.
#[derive(Debug)]
pub struct MetaWriter {
    file: SegmentFileWriter,
    written: bool,
}

impl MetaWriter {
    /// Create `{segment}.meta`.
    pub fn create(storage: Arc<dyn Storage>, segment: &str) -> Result<Self> {
        Self::create_at(storage, segment, current_time_millis())
    }

    /// Create `{segment}.meta` with an explicit header timestamp.
    pub fn create_at(storage: Arc<dyn Storage>, segment: &str, timestamp: i64) -> Result<Self> {
        Ok(MetaWriter {
            file: SegmentFileWriter::create(storage, segment, FileKind::Meta, timestamp)?,
            written: false,
        })
    }

    /// Write the record. A meta file holds exactly one.
    pub fn write(&mut self, metadata: &SegmentMetadata) -> Result<()> {
        if self.written {
            return Err(TesseraError::invalid_operation(format!(
                "{} already holds a metadata record",
                self.file.name()
            )));
        }

        let out = self.file.out();
        out.write_i64(metadata.creation_time)?;
        out.write_i32(metadata.document_count)?;
        out.write_i32(metadata.min_doc_id)?;
        out.write_i32(metadata.max_doc_id)?;
        out.write_i64(metadata.checksum)?;
        out.write_u32(0)?;

        self.written = true;
        Ok(())
    }

    /// Finish the file and reopen it for reading.
    pub fn complete(self) -> Result<MetaReader> {
        if !self.written {
            return Err(TesseraError::invalid_operation(format!(
                "{} has no metadata record",
                self.file.name()
            )));
        }
        MetaReader::from_file(self.file.complete(1)?)
    }
}

/// Reads a segment's `.meta` file.
#[derive(Debug)]
pub struct MetaReader {
    file: SegmentFileReader,
}

impl MetaReader {
    /// Open `{segment}.meta`.
    pub fn open(storage: &dyn Storage, segment: &str) -> Result<Self> {
        let name = FileKind::Meta.file_name(segment);
        Self::from_file(SegmentFileReader::open(storage, &name, FileKind::Meta)?)
    }

    /// Wrap an already opened file.
    pub fn from_file(file: SegmentFileReader) -> Result<Self> {
        if file.header().kind != FileKind::Meta {
            return Err(TesseraError::invalid_header(
                file.name(),
                format!("expected meta file, found {}", file.header().kind),
            ));
        }
        Ok(MetaReader { file })
    }

    /// The validated header.
    pub fn header(&self) -> &FileHeader {
        self.file.header()
    }

    /// Read the record and verify its checksum.
    pub fn read(&mut self) -> Result<SegmentMetadata> {
        let name = self.file.name().to_string();
        let record_count = self.file.header().record_count;
        if record_count != 1 {
            return Err(TesseraError::corrupt_metadata(format!(
                "{name}: expected 1 record, header declares {record_count}"
            )));
        }

        self.file.seek_to_data()?;
        let input = self.file.input()?;
        if input.remaining() != RECORD_SIZE {
            return Err(TesseraError::corrupt_metadata(format!(
                "{name}: record is {} bytes, expected {RECORD_SIZE}",
                input.remaining()
            )));
        }

        let creation_time = input.read_i64()?;
        let document_count = input.read_i32()?;
        let min_doc_id = input.read_i32()?;
        let max_doc_id = input.read_i32()?;
        let stored = input.read_i64()?;
        let reserved = input.read_u32()?;

        if reserved != 0 {
            return Err(TesseraError::corrupt_metadata(format!(
                "{name}: reserved bytes are {reserved:#x}, expected 0"
            )));
        }
        let computed = checksum(creation_time, document_count, min_doc_id, max_doc_id);
        if stored != computed {
            return Err(TesseraError::corrupt_metadata(format!(
                "{name}: checksum mismatch (stored {stored:#x}, computed {computed:#x})"
            )));
        }
        validate(document_count, min_doc_id, max_doc_id)
            .map_err(|reason| TesseraError::corrupt_metadata(format!("{name}: {reason}")))?;

        Ok(SegmentMetadata {
            creation_time,
            document_count,
            min_doc_id,
            max_doc_id,
            checksum: stored,
        })
    }

    /// Release the file handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::header::HEADER_SIZE;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_validation() {
        assert!(SegmentMetadata::new(0, 0, 0, 0).is_ok());
        assert!(SegmentMetadata::new(0, 2, 5, 6).is_ok());
        assert!(SegmentMetadata::new(0, -1, 0, 0).is_err());
        assert!(SegmentMetadata::new(0, 1, 6, 5).is_err());
        assert!(SegmentMetadata::new(0, 1, -1, 3).is_err());
        assert!(SegmentMetadata::new(0, 3, 5, 6).is_err());
        // Span computed without overflow.
        assert!(SegmentMetadata::new(0, i32::MAX, 0, i32::MAX).is_ok());

        let err = SegmentMetadata::new(0, 1, 6, 5).unwrap_err();
        assert!(matches!(err, TesseraError::InvalidArgument(_)));
    }

    #[test]
    fn test_for_doc_ids() {
        let meta = SegmentMetadata::for_doc_ids([7, 3, 5]).unwrap();
        assert_eq!(meta.document_count(), 3);
        assert_eq!((meta.min_doc_id(), meta.max_doc_id()), (3, 7));

        let empty = SegmentMetadata::for_doc_ids(std::iter::empty()).unwrap();
        assert_eq!(empty.document_count(), 0);

        assert!(SegmentMetadata::for_doc_ids([-4]).is_err());
    }

    #[test]
    fn test_round_trip() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let meta = SegmentMetadata::new(1_700_000_000_123, 2, 10, 11).unwrap();

        let mut writer = MetaWriter::create(Arc::clone(&storage), "segment_0").unwrap();
        writer.write(&meta).unwrap();
        assert!(writer.write(&meta).is_err());
        let mut reader = writer.complete().unwrap();

        assert_eq!(reader.read().unwrap(), meta);
        assert_eq!(
            storage.file_size("segment_0.meta").unwrap(),
            HEADER_SIZE as u64 + RECORD_SIZE
        );
    }

    #[test]
    fn test_any_record_byte_mutation_is_detected() {
        let storage = Arc::new(MemoryStorage::new_default());
        let dyn_storage: Arc<dyn Storage> = storage.clone();
        let meta = SegmentMetadata::new(42, 3, 0, 9).unwrap();

        for byte in 0..RECORD_SIZE as usize {
            let mut writer = MetaWriter::create(Arc::clone(&dyn_storage), "s").unwrap();
            writer.write(&meta).unwrap();
            writer.complete().unwrap();

            let offset = HEADER_SIZE as usize + byte;
            let original = {
                let mut reader = MetaReader::open(storage.as_ref(), "s").unwrap();
                reader.read().unwrap();
                let data = read_file(&storage, "s.meta");
                data[offset]
            };
            storage.corrupt_byte("s.meta", offset, original ^ 0x5A).unwrap();

            let err = MetaReader::open(storage.as_ref(), "s")
                .unwrap()
                .read()
                .unwrap_err();
            assert!(
                matches!(err, TesseraError::CorruptMetadata(_)),
                "byte {byte}: {err}"
            );
        }
    }

    fn read_file(storage: &MemoryStorage, name: &str) -> Vec<u8> {
        use std::io::Read;
        let mut input = storage.open_input(name).unwrap();
        let mut data = Vec::new();
        input.read_to_end(&mut data).unwrap();
        data
    }
}
