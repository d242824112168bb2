//! Immutable segment files.
//!
//! A segment is written once as four files sharing one name:
//!
//! - `{segment}.doc` - stored documents ([`document`])
//! - `{segment}.post` - delta-encoded posting lists ([`posting`])
//! - `{segment}.dic` - sorted term dictionary with a block index ([`dictionary`])
//! - `{segment}.meta` - checksummed segment counters ([`meta`])
//!
//! Every file starts with a [`FileHeader`](header::FileHeader) and is written
//! through a [`SegmentFileWriter`](file::SegmentFileWriter), whose
//! `complete()` hands back a validated reader for the finished file.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, TesseraError};
use crate::storage::Storage;

pub mod dictionary;
pub mod document;
pub mod file;
pub mod header;
pub mod meta;
pub mod posting;
pub mod reader;

pub use dictionary::{Term, TermDictionaryReader, TermDictionaryWriter};
pub use document::{DocumentReader, DocumentWriter};
pub use file::{SegmentFileReader, SegmentFileWriter};
pub use header::FileHeader;
pub use meta::{MetaReader, MetaWriter, SegmentMetadata};
pub use posting::{Posting, PostingReader, PostingWriter};
pub use reader::SegmentReader;

/// The kind of a segment file, stored as the header's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Stored documents.
    Document,
    /// Term dictionary.
    Dictionary,
    /// Posting lists.
    Posting,
    /// Segment metadata.
    Meta,
}

impl FileKind {
    /// Every kind, in the order a flush writes them.
    pub const ALL: [FileKind; 4] = [
        FileKind::Document,
        FileKind::Posting,
        FileKind::Dictionary,
        FileKind::Meta,
    ];

    /// The header type tag.
    pub fn code(self) -> u8 {
        match self {
            FileKind::Document => 1,
            FileKind::Dictionary => 2,
            FileKind::Posting => 3,
            FileKind::Meta => 4,
        }
    }

    /// Look up a kind by header type tag.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FileKind::Document),
            2 => Some(FileKind::Dictionary),
            3 => Some(FileKind::Posting),
            4 => Some(FileKind::Meta),
            _ => None,
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Document => "doc",
            FileKind::Dictionary => "dic",
            FileKind::Posting => "post",
            FileKind::Meta => "meta",
        }
    }

    /// Name of this kind's file for `segment`.
    pub fn file_name(self, segment: &str) -> String {
        format!("{segment}.{}", self.extension())
    }

    /// Split `segment_0.dic` into `("segment_0", Dictionary)`.
    pub fn parse_file_name(name: &str) -> Option<(&str, FileKind)> {
        let (segment, extension) = name.rsplit_once('.')?;
        let kind = FileKind::ALL
            .into_iter()
            .find(|kind| kind.extension() == extension)?;
        Some((segment, kind))
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Any one opened segment file, selected by the type tag in its header.
#[derive(Debug)]
pub enum SegmentFile {
    Document(DocumentReader),
    Dictionary(TermDictionaryReader),
    Posting(PostingReader),
    Meta(MetaReader),
}

impl SegmentFile {
    /// Open `name` and dispatch on the type recorded in its header.
    pub fn open(storage: &dyn Storage, name: &str) -> Result<Self> {
        let file = SegmentFileReader::open_any(storage, name)?;
        let kind = file.header().kind;

        Ok(match kind {
            FileKind::Document => SegmentFile::Document(DocumentReader::from_file(file)?),
            FileKind::Dictionary => {
                SegmentFile::Dictionary(TermDictionaryReader::from_file(file)?)
            }
            FileKind::Posting => SegmentFile::Posting(PostingReader::from_file(file)?),
            FileKind::Meta => SegmentFile::Meta(MetaReader::from_file(file)?),
        })
    }

    /// The kind of the opened file.
    pub fn kind(&self) -> FileKind {
        self.header().kind
    }

    /// The validated header.
    pub fn header(&self) -> &FileHeader {
        match self {
            SegmentFile::Document(reader) => reader.header(),
            SegmentFile::Dictionary(reader) => reader.header(),
            SegmentFile::Posting(reader) => reader.header(),
            SegmentFile::Meta(reader) => reader.header(),
        }
    }

    /// Close the underlying file. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self {
            SegmentFile::Document(reader) => reader.close(),
            SegmentFile::Dictionary(reader) => reader.close(),
            SegmentFile::Posting(reader) => reader.close(),
            SegmentFile::Meta(reader) => reader.close(),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn current_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// Convert a length into the u32 a record field stores.
pub(crate) fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| TesseraError::invalid_argument(format!("{what} {value} exceeds u32 range")))
}
