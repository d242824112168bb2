//! The fixed preamble at offset 0 of every segment file.
//!
//! ```text
//! magic: u32 | version: u32 | type: u8 | record_count: u32 | timestamp: i64 | header_size: u32
//! ```
//!
//! All fields are big-endian; the header is always [`HEADER_SIZE`] bytes.

use crate::error::{Result, TesseraError};
use crate::segment::FileKind;
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{StorageInput, StorageOutput};

/// `"TSRA"`.
pub const MAGIC: u32 = 0x5453_5241;

/// Format version 1.0.
pub const VERSION: u32 = 0x0001_0000;

/// Encoded size of a header in bytes.
pub const HEADER_SIZE: u32 = 4 + 4 + 1 + 4 + 8 + 4;

/// Parsed header of a segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Which kind of file this is.
    pub kind: FileKind,
    /// Number of records in the file.
    pub record_count: u32,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl FileHeader {
    /// Create a header.
    pub fn new(kind: FileKind, record_count: u32, timestamp: i64) -> Self {
        FileHeader {
            kind,
            record_count,
            timestamp,
        }
    }

    /// Write the header at the writer's current position.
    pub fn write_to<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_u32(MAGIC)?;
        writer.write_u32(VERSION)?;
        writer.write_u8(self.kind.code())?;
        writer.write_u32(self.record_count)?;
        writer.write_i64(self.timestamp)?;
        writer.write_u32(HEADER_SIZE)?;
        Ok(())
    }

    /// Read and validate a header from offset 0.
    ///
    /// `file` is only used for error messages. When `expected` is given the
    /// declared type must match it.
    pub fn read_from<R: StorageInput>(
        reader: &mut StructReader<R>,
        file: &str,
        expected: Option<FileKind>,
    ) -> Result<Self> {
        if reader.size() < HEADER_SIZE as u64 {
            return Err(TesseraError::invalid_header(
                file,
                format!(
                    "file is {} bytes, shorter than the {HEADER_SIZE}-byte header",
                    reader.size()
                ),
            ));
        }
        reader.seek(0)?;

        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(TesseraError::invalid_header(
                file,
                format!("magic mismatch: expected {MAGIC:#010x}, found {magic:#010x}"),
            ));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(TesseraError::invalid_header(
                file,
                format!("version mismatch: expected {VERSION:#010x}, found {version:#010x}"),
            ));
        }

        let code = reader.read_u8()?;
        let record_count = reader.read_u32()?;
        let timestamp = reader.read_i64()?;

        let header_size = reader.read_u32()?;
        if header_size != HEADER_SIZE {
            return Err(TesseraError::invalid_header(
                file,
                format!("header size mismatch: expected {HEADER_SIZE}, found {header_size}"),
            ));
        }

        let kind = FileKind::from_code(code).ok_or_else(|| {
            TesseraError::invalid_header(file, format!("unknown file type {code}"))
        })?;
        if let Some(expected) = expected
            && kind != expected
        {
            return Err(TesseraError::invalid_header(
                file,
                format!("type mismatch: expected {expected}, found {kind}"),
            ));
        }

        Ok(FileHeader {
            kind,
            record_count,
            timestamp,
        })
    }
}
