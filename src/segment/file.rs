//! Cursor-based writer and reader shared by every segment file kind.

use std::sync::Arc;

use log::debug;

use crate::error::{Result, TesseraError};
use crate::segment::FileKind;
use crate::segment::header::{FileHeader, HEADER_SIZE};
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{Storage, StorageError, StorageInput, StorageOutput};

/// Sequential writer for one segment file.
///
/// Creation writes a placeholder header with a record count of zero.
/// [`SegmentFileWriter::complete`] rewrites the header with the real count,
/// syncs and closes the file, and reopens it as a [`SegmentFileReader`].
pub struct SegmentFileWriter {
    storage: Arc<dyn Storage>,
    name: String,
    kind: FileKind,
    timestamp: i64,
    out: StructWriter<Box<dyn StorageOutput>>,
}

impl SegmentFileWriter {
    /// Create `{segment}.{ext}` and write its placeholder header.
    pub fn create(
        storage: Arc<dyn Storage>,
        segment: &str,
        kind: FileKind,
        timestamp: i64,
    ) -> Result<Self> {
        let name = kind.file_name(segment);
        let mut out = StructWriter::new(storage.create_output(&name)?);
        FileHeader::new(kind, 0, timestamp).write_to(&mut out)?;

        Ok(SegmentFileWriter {
            storage,
            name,
            kind,
            timestamp,
            out,
        })
    }

    /// The file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file kind.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Position the next write will land at.
    pub fn position(&self) -> u64 {
        self.out.position()
    }

    /// The underlying cursor.
    pub fn out(&mut self) -> &mut StructWriter<Box<dyn StorageOutput>> {
        &mut self.out
    }

    /// Finalize the header, sync, close and reopen the file for reading.
    pub fn complete(mut self, record_count: u32) -> Result<SegmentFileReader> {
        let length = self.out.len();
        self.out.seek(0)?;
        FileHeader::new(self.kind, record_count, self.timestamp).write_to(&mut self.out)?;
        self.out.seek_to_end()?;
        self.out.close()?;

        debug!(
            "Completed {} ({} records, {} bytes)",
            self.name, record_count, length
        );

        SegmentFileReader::open(self.storage.as_ref(), &self.name, self.kind)
    }
}

impl std::fmt::Debug for SegmentFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentFileWriter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("position", &self.out.position())
            .finish()
    }
}

/// Reader for one segment file with a validated header.
pub struct SegmentFileReader {
    name: String,
    header: FileHeader,
    input: Option<StructReader<Box<dyn StorageInput>>>,
}

impl SegmentFileReader {
    /// Open `name` and validate that its header declares `kind`.
    pub fn open(storage: &dyn Storage, name: &str, kind: FileKind) -> Result<Self> {
        Self::open_with(storage, name, Some(kind))
    }

    /// Open `name` accepting any valid file kind.
    pub fn open_any(storage: &dyn Storage, name: &str) -> Result<Self> {
        Self::open_with(storage, name, None)
    }

    fn open_with(storage: &dyn Storage, name: &str, kind: Option<FileKind>) -> Result<Self> {
        let mut input = StructReader::new(storage.open_input(name)?)?;
        let header = FileHeader::read_from(&mut input, name, kind)?;

        Ok(SegmentFileReader {
            name: name.to_string(),
            header,
            input: Some(input),
        })
    }

    /// The file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The validated header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The cursor, or an error if the reader was closed.
    pub fn input(&mut self) -> Result<&mut StructReader<Box<dyn StorageInput>>> {
        self.input.as_mut().ok_or_else(|| {
            TesseraError::from(StorageError::InvalidOperation(format!(
                "{} is closed",
                self.name
            )))
        })
    }

    /// Move to an absolute offset.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.input()?.seek(position)
    }

    /// Move to the first byte after the header.
    pub fn seek_to_data(&mut self) -> Result<()> {
        self.seek(HEADER_SIZE as u64)
    }

    /// Current offset.
    pub fn position(&self) -> u64 {
        self.input.as_ref().map_or(0, |input| input.position())
    }

    /// File length in bytes.
    pub fn size(&self) -> u64 {
        self.input.as_ref().map_or(0, |input| input.size())
    }

    /// Whether the reader was closed.
    pub fn is_closed(&self) -> bool {
        self.input.is_none()
    }

    /// Release the file handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.input.take() {
            Some(input) => input.close(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for SegmentFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentFileReader")
            .field("name", &self.name)
            .field("header", &self.header)
            .field("closed", &self.is_closed())
            .finish()
    }
}
