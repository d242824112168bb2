//! Structured binary I/O for segment and commit files.
//!
//! [`StructWriter`] and [`StructReader`] encode fixed-width big-endian
//! integers and length-prefixed blobs while tracking their own position, so a
//! writer can seek back to patch a placeholder and then return to its append
//! position without asking the OS where the cursor is.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, TesseraError};
use crate::storage::{StorageInput, StorageOutput};

/// A structured file writer for binary data.
pub struct StructWriter<W: StorageOutput> {
    writer: W,
    hasher: crc32fast::Hasher,
    position: u64,
    end: u64,
    patched: bool,
}

impl<W: StorageOutput> StructWriter<W> {
    /// Create a new structured file writer positioned at offset 0.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: crc32fast::Hasher::new(),
            position: 0,
            end: 0,
            patched: false,
        }
    }

    fn advance(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.position += bytes.len() as u64;
        self.end = self.end.max(self.position);
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.advance(&[value]);
        Ok(())
    }

    /// Write a u16 value (big-endian).
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.writer.write_u16::<BigEndian>(value)?;
        self.advance(&value.to_be_bytes());
        Ok(())
    }

    /// Write a u32 value (big-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<BigEndian>(value)?;
        self.advance(&value.to_be_bytes());
        Ok(())
    }

    /// Write a u64 value (big-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<BigEndian>(value)?;
        self.advance(&value.to_be_bytes());
        Ok(())
    }

    /// Write an i32 value (big-endian).
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.writer.write_i32::<BigEndian>(value)?;
        self.advance(&value.to_be_bytes());
        Ok(())
    }

    /// Write an i64 value (big-endian).
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.writer.write_i64::<BigEndian>(value)?;
        self.advance(&value.to_be_bytes());
        Ok(())
    }

    /// Write bytes with a u32 length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        let length = u32::try_from(value.len()).map_err(|_| {
            TesseraError::invalid_argument(format!("blob of {} bytes is too long", value.len()))
        })?;
        self.write_u32(length)?;
        self.write_raw(value)
    }

    /// Write bytes with a u16 length prefix.
    pub fn write_short_bytes(&mut self, value: &[u8]) -> Result<()> {
        let length = u16::try_from(value.len()).map_err(|_| {
            TesseraError::invalid_argument(format!(
                "value of {} bytes exceeds the 65535-byte limit",
                value.len()
            ))
        })?;
        self.write_u16(length)?;
        self.write_raw(value)
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.advance(value);
        Ok(())
    }

    /// Move the write position to `position`.
    ///
    /// Seeking disables [`StructWriter::write_checksum`], whose running CRC is
    /// only meaningful for strictly sequential output.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.writer.seek(SeekFrom::Start(position))?;
        self.position = position;
        self.patched = true;
        Ok(())
    }

    /// Return to the end of everything written so far.
    pub fn seek_to_end(&mut self) -> Result<()> {
        let end = self.end;
        self.seek(end)
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total bytes written, independent of the current position.
    pub fn len(&self) -> u64 {
        self.end
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    /// Append the CRC-32 of everything written so far.
    pub fn write_checksum(&mut self) -> Result<()> {
        if self.patched {
            return Err(TesseraError::invalid_operation(
                "checksum is undefined after seeking",
            ));
        }
        let checksum = self.hasher.clone().finalize();
        self.writer.write_u32::<BigEndian>(checksum)?;
        self.position += 4;
        self.end = self.position;
        Ok(())
    }

    /// Flush, sync and close the underlying output.
    pub fn close(mut self) -> Result<()> {
        self.writer.flush_and_sync()?;
        self.writer.close()
    }
}

/// A structured file reader for binary data.
pub struct StructReader<R: StorageInput> {
    reader: R,
    hasher: crc32fast::Hasher,
    position: u64,
    file_size: u64,
}

impl<R: StorageInput> StructReader<R> {
    /// Create a new structured file reader positioned at offset 0.
    pub fn new(reader: R) -> Result<Self> {
        let file_size = reader.size()?;
        Ok(StructReader {
            reader,
            hasher: crc32fast::Hasher::new(),
            position: 0,
            file_size,
        })
    }

    fn advance(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.position += bytes.len() as u64;
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.reader.read_u8()?;
        self.advance(&[value]);
        Ok(value)
    }

    /// Read a u16 value (big-endian).
    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.reader.read_u16::<BigEndian>()?;
        self.advance(&value.to_be_bytes());
        Ok(value)
    }

    /// Read a u32 value (big-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<BigEndian>()?;
        self.advance(&value.to_be_bytes());
        Ok(value)
    }

    /// Read a u64 value (big-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        let value = self.reader.read_u64::<BigEndian>()?;
        self.advance(&value.to_be_bytes());
        Ok(value)
    }

    /// Read an i32 value (big-endian).
    pub fn read_i32(&mut self) -> Result<i32> {
        let value = self.reader.read_i32::<BigEndian>()?;
        self.advance(&value.to_be_bytes());
        Ok(value)
    }

    /// Read an i64 value (big-endian).
    pub fn read_i64(&mut self) -> Result<i64> {
        let value = self.reader.read_i64::<BigEndian>()?;
        self.advance(&value.to_be_bytes());
        Ok(value)
    }

    /// Read bytes with a u32 length prefix.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let length = self.read_u32()? as u64;
        self.read_raw(length)
    }

    /// Read bytes with a u16 length prefix.
    pub fn read_short_bytes(&mut self) -> Result<Vec<u8>> {
        let length = self.read_u16()? as u64;
        self.read_raw(length)
    }

    /// Read a UTF-8 string with a u16 length prefix.
    pub fn read_short_string(&mut self) -> Result<String> {
        let bytes = self.read_short_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| TesseraError::corruption(format!("Invalid UTF-8 at {}: {e}", self.position)))
    }

    /// Read exactly `length` raw bytes.
    pub fn read_raw(&mut self, length: u64) -> Result<Vec<u8>> {
        if length > self.remaining() {
            return Err(TesseraError::corruption(format!(
                "length {length} at offset {} runs past end of file ({} bytes)",
                self.position, self.file_size
            )));
        }
        let mut bytes = vec![0u8; length as usize];
        self.reader.read_exact(&mut bytes)?;
        self.advance(&bytes);
        Ok(bytes)
    }

    /// Move the read position to `position`.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(position))?;
        self.position = position;
        self.hasher = crc32fast::Hasher::new();
        Ok(())
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get file size.
    pub fn size(&self) -> u64 {
        self.file_size
    }

    /// Bytes between the current position and the end of the file.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.position)
    }

    /// Check if we're at end of file.
    pub fn is_eof(&self) -> bool {
        self.position >= self.file_size
    }

    /// Read a trailing CRC-32 and compare it with everything read since the
    /// last seek.
    pub fn verify_checksum(&mut self) -> Result<bool> {
        let expected = self.hasher.clone().finalize();
        let stored = self.reader.read_u32::<BigEndian>()?;
        self.position += 4;
        Ok(stored == expected)
    }

    /// Close the reader.
    pub fn close(mut self) -> Result<()> {
        self.reader.close()
    }
}
