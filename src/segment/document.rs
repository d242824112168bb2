//! Stored document file (`.doc`).
//!
//! One record per document:
//!
//! ```text
//! doc_id: u32 | content_length: u32 | field_count: u32 | field*
//! field := name_len: u16 | name | tag: u8 | value
//! value := STRING (len: u32, utf8) | NUMERIC (i64) | BINARY (len: u32, bytes)
//! ```
//!
//! `content_length` counts the bytes after it, so a reader can skip a record
//! without decoding its fields.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::document::{DocId, Document, FieldValue};
use crate::error::{Result, TesseraError};
use crate::segment::file::{SegmentFileReader, SegmentFileWriter};
use crate::segment::header::FileHeader;
use crate::segment::{FileKind, current_time_millis, to_u32};
use crate::storage::Storage;

const TYPE_STRING: u8 = 1;
const TYPE_NUMERIC: u8 = 2;
const TYPE_BINARY: u8 = 3;

/// Writes documents to a segment's `.doc` file.
#[derive(Debug)]
pub struct DocumentWriter {
    file: SegmentFileWriter,
    count: u32,
}

impl DocumentWriter {
    /// Create `{segment}.doc`.
    pub fn create(storage: Arc<dyn Storage>, segment: &str) -> Result<Self> {
        Self::create_at(storage, segment, current_time_millis())
    }

    /// Create `{segment}.doc` with an explicit header timestamp.
    pub fn create_at(storage: Arc<dyn Storage>, segment: &str, timestamp: i64) -> Result<Self> {
        Ok(DocumentWriter {
            file: SegmentFileWriter::create(storage, segment, FileKind::Document, timestamp)?,
            count: 0,
        })
    }

    /// Append one document and return the offset its record starts at.
    pub fn write_document(&mut self, document: &Document) -> Result<u64> {
        let doc_id = document.id();
        if doc_id < 0 {
            return Err(TesseraError::invalid_argument(format!(
                "document id must be non-negative, got {doc_id}"
            )));
        }

        let content = encode_fields(document)?;
        let offset = self.file.position();

        let out = self.file.out();
        out.write_u32(doc_id as u32)?;
        out.write_u32(to_u32(content.len(), "document length")?)?;
        out.write_raw(&content)?;

        self.count += 1;
        Ok(offset)
    }

    /// Number of documents written so far.
    pub fn document_count(&self) -> u32 {
        self.count
    }

    /// Finish the file and reopen it for reading.
    pub fn complete(self) -> Result<DocumentReader> {
        DocumentReader::from_file(self.file.complete(self.count)?)
    }
}

fn encode_fields(document: &Document) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.write_u32::<BigEndian>(to_u32(document.len(), "field count")?)?;

    for (name, value) in document.fields() {
        let name_len = u16::try_from(name.len()).map_err(|_| {
            TesseraError::invalid_argument(format!(
                "field name of {} bytes exceeds the 65535-byte limit",
                name.len()
            ))
        })?;
        buf.write_u16::<BigEndian>(name_len)?;
        buf.extend_from_slice(name.as_bytes());

        match value {
            FieldValue::Text(text) => {
                buf.write_u8(TYPE_STRING)?;
                buf.write_u32::<BigEndian>(to_u32(text.len(), "text length")?)?;
                buf.extend_from_slice(text.as_bytes());
            }
            FieldValue::Numeric(number) => {
                buf.write_u8(TYPE_NUMERIC)?;
                buf.write_i64::<BigEndian>(*number)?;
            }
            FieldValue::Binary(bytes) => {
                buf.write_u8(TYPE_BINARY)?;
                buf.write_u32::<BigEndian>(to_u32(bytes.len(), "binary length")?)?;
                buf.extend_from_slice(bytes);
            }
        }
    }

    Ok(buf)
}

fn decode_fields(doc_id: DocId, content: &[u8]) -> Result<Document> {
    let corrupt = |what: String| TesseraError::corruption(format!("document {doc_id}: {what}"));
    let mut cursor = Cursor::new(content);

    let read_exact = |cursor: &mut Cursor<&[u8]>, len: usize| -> Result<Vec<u8>> {
        let remaining = content.len() - cursor.position() as usize;
        if len > remaining {
            return Err(TesseraError::corruption(format!(
                "document {doc_id}: length {len} exceeds remaining {remaining} bytes"
            )));
        }
        let mut bytes = vec![0u8; len];
        cursor.read_exact(&mut bytes)?;
        Ok(bytes)
    };

    let field_count = cursor.read_u32::<BigEndian>()?;
    let mut fields = BTreeMap::new();

    for _ in 0..field_count {
        let name_len = cursor.read_u16::<BigEndian>()? as usize;
        let name = String::from_utf8(read_exact(&mut cursor, name_len)?)
            .map_err(|e| corrupt(format!("field name is not UTF-8: {e}")))?;

        let value = match cursor.read_u8()? {
            TYPE_STRING => {
                let len = cursor.read_u32::<BigEndian>()? as usize;
                let text = String::from_utf8(read_exact(&mut cursor, len)?)
                    .map_err(|e| corrupt(format!("field {name} is not UTF-8: {e}")))?;
                FieldValue::Text(text)
            }
            TYPE_NUMERIC => FieldValue::Numeric(cursor.read_i64::<BigEndian>()?),
            TYPE_BINARY => {
                let len = cursor.read_u32::<BigEndian>()? as usize;
                FieldValue::Binary(read_exact(&mut cursor, len)?)
            }
            tag => return Err(corrupt(format!("unknown type tag {tag} for field {name}"))),
        };
        fields.insert(name, value);
    }

    if cursor.position() as usize != content.len() {
        return Err(corrupt(format!(
            "record declares {} bytes but fields use {}",
            content.len(),
            cursor.position()
        )));
    }

    Ok(Document::new(doc_id, fields))
}

/// Reads documents from a segment's `.doc` file.
#[derive(Debug)]
pub struct DocumentReader {
    file: SegmentFileReader,
}

impl DocumentReader {
    /// Open `{segment}.doc`.
    pub fn open(storage: &dyn Storage, segment: &str) -> Result<Self> {
        let name = FileKind::Document.file_name(segment);
        Self::from_file(SegmentFileReader::open(storage, &name, FileKind::Document)?)
    }

    /// Wrap an already opened file, positioned at the first record.
    pub fn from_file(mut file: SegmentFileReader) -> Result<Self> {
        if file.header().kind != FileKind::Document {
            return Err(TesseraError::invalid_header(
                file.name(),
                format!("expected doc file, found {}", file.header().kind),
            ));
        }
        file.seek_to_data()?;
        Ok(DocumentReader { file })
    }

    /// The validated header.
    pub fn header(&self) -> &FileHeader {
        self.file.header()
    }

    /// Number of documents in the file.
    pub fn document_count(&self) -> u32 {
        self.file.header().record_count
    }

    /// Move to a record offset returned by [`DocumentWriter::write_document`].
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.file.seek(offset)
    }

    /// Read the record at the current position.
    pub fn read_document(&mut self) -> Result<Document> {
        let input = self.file.input()?;
        let doc_id = input.read_u32()?;
        let doc_id = DocId::try_from(doc_id).map_err(|_| {
            TesseraError::corruption(format!("document id {doc_id} out of range"))
        })?;
        let content_length = input.read_u32()? as u64;
        let content = input.read_raw(content_length)?;

        decode_fields(doc_id, &content)
    }

    /// Read the record starting at `offset`.
    pub fn read_document_at(&mut self, offset: u64) -> Result<Document> {
        self.seek(offset)?;
        self.read_document()
    }

    /// Read every document in file order.
    pub fn read_all(&mut self) -> Result<Vec<Document>> {
        self.file.seek_to_data()?;
        (0..self.document_count())
            .map(|_| self.read_document())
            .collect()
    }

    /// Release the file handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn storage() -> Arc<dyn Storage> {
        Arc::new(MemoryStorage::new_default())
    }

    #[test]
    fn test_document_round_trip() {
        let storage = storage();
        let doc = Document::builder(3)
            .add_text("title", "Hello, 世界")
            .add_numeric("year", i64::MIN)
            .add_binary("raw", vec![0, 255, 7])
            .add_text("empty", "")
            .build();

        let mut writer = DocumentWriter::create(Arc::clone(&storage), "segment_0").unwrap();
        let offset = writer.write_document(&doc).unwrap();
        let mut reader = writer.complete().unwrap();

        assert_eq!(reader.document_count(), 1);
        assert_eq!(reader.read_document_at(offset).unwrap(), doc);
    }

    #[test]
    fn test_numeric_widened_from_i32() {
        let storage = storage();
        let doc = Document::builder(0)
            .add_field("n", FieldValue::from(-5i32))
            .build();

        let mut writer = DocumentWriter::create(Arc::clone(&storage), "s").unwrap();
        writer.write_document(&doc).unwrap();
        let mut reader = writer.complete().unwrap();

        let read = reader.read_all().unwrap();
        assert_eq!(read[0].get_field("n"), Some(&FieldValue::Numeric(-5)));
    }

    #[test]
    fn test_sequential_and_offset_reads() {
        let storage = storage();
        let docs: Vec<Document> = (0..10)
            .map(|i| {
                Document::builder(i * 2)
                    .add_text("body", format!("document number {i}"))
                    .build()
            })
            .collect();

        let mut writer = DocumentWriter::create(Arc::clone(&storage), "s").unwrap();
        let offsets: Vec<u64> = docs
            .iter()
            .map(|doc| writer.write_document(doc).unwrap())
            .collect();
        let mut reader = writer.complete().unwrap();

        assert_eq!(reader.read_all().unwrap(), docs);
        assert_eq!(reader.read_document_at(offsets[7]).unwrap(), docs[7]);
        assert_eq!(reader.read_document().unwrap(), docs[8]);
    }

    #[test]
    fn test_negative_id_rejected() {
        let storage = storage();
        let mut writer = DocumentWriter::create(Arc::clone(&storage), "s").unwrap();

        let err = writer
            .write_document(&Document::builder(-1).build())
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidArgument(_)));
        assert_eq!(writer.document_count(), 0);
    }

    #[test]
    fn test_unknown_type_tag_is_corruption() {
        let storage = Arc::new(MemoryStorage::new_default());
        let dyn_storage: Arc<dyn Storage> = storage.clone();
        let mut writer = DocumentWriter::create(dyn_storage, "s").unwrap();
        let offset = writer
            .write_document(&Document::builder(1).add_numeric("n", 1).build())
            .unwrap();
        writer.complete().unwrap();

        // Record: doc_id(4) content_length(4) field_count(4) name_len(2) "n"(1) tag
        let tag_offset = offset as usize + 4 + 4 + 4 + 2 + 1;
        storage.corrupt_byte("s.doc", tag_offset, 9).unwrap();

        let mut reader = DocumentReader::open(storage.as_ref(), "s").unwrap();
        let err = reader.read_document_at(offset).unwrap_err();
        assert!(matches!(err, TesseraError::Corruption(_)));
    }
}
