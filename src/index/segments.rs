//! The persisted list of live segments and its commit protocol.
//!
//! A commit writes `segments_{G}` and then points `segments.gen` at it:
//!
//! 1. serialize the set to a temp file and rename it to `segments_{G}`;
//! 2. write `G` as decimal ASCII to a second temp file and rename it over
//!    `segments.gen`;
//! 3. only then advance the in-memory generation.
//!
//! A crash at any point leaves the pointer naming either the previous
//! generation or the new one, and both files are complete.
//!
//! `segments_{G}` layout:
//!
//! ```text
//! magic: u32 ("SEGS") | format_version: u32 | generation: i64 | count: i32
//! descriptor * count
//! crc32: u32 (over everything above)
//! ```

use std::io::{Read, Write};

use log::{info, warn};

use crate::error::{Result, TesseraError};
use crate::index::segment::SegmentDescriptor;
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{Storage, StorageInput, StorageOutput};

/// Name of the generation pointer file.
pub const SEGMENTS_GEN: &str = "segments.gen";

/// Prefix of the per-generation segment list files.
pub const SEGMENTS_PREFIX: &str = "segments_";

/// "SEGS"
pub const SEGMENTS_MAGIC: u32 = 0x5345_4753;

/// Version of the `segments_N` layout.
pub const SEGMENTS_FORMAT_VERSION: u32 = 1;

const PENDING_SEGMENTS: &str = "pending_segments";
const PENDING_GEN: &str = "pending_gen";

/// The ordered segment list of one index generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSet {
    generation: i64,
    segments: Vec<SegmentDescriptor>,
}

impl Default for SegmentSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentSet {
    /// An empty set that has never been committed (generation -1).
    pub fn new() -> Self {
        SegmentSet {
            generation: -1,
            segments: Vec::new(),
        }
    }

    /// Name of the segment list file for `generation`.
    pub fn file_name(generation: i64) -> String {
        format!("{SEGMENTS_PREFIX}{generation}")
    }

    /// Load the generation named by `segments.gen`.
    ///
    /// A missing pointer file means a fresh index. A pointer to a missing or
    /// malformed `segments_N` file is corruption.
    pub fn read_latest(storage: &dyn Storage) -> Result<Self> {
        if !storage.file_exists(SEGMENTS_GEN) {
            return Ok(Self::new());
        }

        let generation = read_generation(storage)?;
        let name = Self::file_name(generation);
        if !storage.file_exists(&name) {
            return Err(TesseraError::corruption(format!(
                "{SEGMENTS_GEN} points to missing {name}"
            )));
        }

        let mut input = StructReader::new(storage.open_input(&name)?)?;
        let magic = input.read_u32()?;
        if magic != SEGMENTS_MAGIC {
            return Err(TesseraError::corruption(format!(
                "{name}: bad magic {magic:#010x}"
            )));
        }
        let version = input.read_u32()?;
        if version != SEGMENTS_FORMAT_VERSION {
            return Err(TesseraError::corruption(format!(
                "{name}: unsupported format version {version}"
            )));
        }
        let stored_generation = input.read_i64()?;
        if stored_generation != generation {
            return Err(TesseraError::corruption(format!(
                "{name}: stores generation {stored_generation}"
            )));
        }
        let count = input.read_i32()?;
        if count < 0 {
            return Err(TesseraError::corruption(format!(
                "{name}: negative segment count {count}"
            )));
        }

        let mut segments = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            segments.push(SegmentDescriptor::read_from(&mut input)?);
        }
        if !input.verify_checksum()? {
            return Err(TesseraError::corruption(format!("{name}: checksum mismatch")));
        }
        if !input.is_eof() {
            return Err(TesseraError::corruption(format!(
                "{name}: {} trailing bytes",
                input.remaining()
            )));
        }
        input.close()?;

        Ok(SegmentSet {
            generation,
            segments,
        })
    }

    /// Commit the set as the next generation.
    ///
    /// On failure the generation is unchanged, so retrying targets the same
    /// `segments_N` name.
    pub fn write(&mut self, storage: &dyn Storage) -> Result<()> {
        let next = self.generation + 1;
        let name = Self::file_name(next);

        let (temp, output) = storage.create_temp_output(PENDING_SEGMENTS)?;
        let published = self
            .write_segments_file(output, next)
            .and_then(|_| storage.rename_file(&temp, &name));
        if let Err(err) = published {
            discard_temp(storage, &temp);
            return Err(err);
        }

        let (temp, mut output) = storage.create_temp_output(PENDING_GEN)?;
        let pointed = (|| -> Result<()> {
            output.write_all(next.to_string().as_bytes())?;
            output.flush_and_sync()?;
            output.close()?;
            storage.rename_file(&temp, SEGMENTS_GEN)
        })();
        if let Err(err) = pointed {
            drop(output);
            discard_temp(storage, &temp);
            return Err(err);
        }

        storage.sync()?;
        self.generation = next;
        info!(
            "Committed generation {} with {} segments",
            next,
            self.segments.len()
        );
        Ok(())
    }

    fn write_segments_file<W: StorageOutput>(&self, output: W, generation: i64) -> Result<()> {
        let count = i32::try_from(self.segments.len()).map_err(|_| {
            TesseraError::invalid_argument(format!(
                "{} segments exceed i32 range",
                self.segments.len()
            ))
        })?;

        let mut out = StructWriter::new(output);
        out.write_u32(SEGMENTS_MAGIC)?;
        out.write_u32(SEGMENTS_FORMAT_VERSION)?;
        out.write_i64(generation)?;
        out.write_i32(count)?;
        for segment in &self.segments {
            segment.write_to(&mut out)?;
        }
        out.write_checksum()?;
        out.close()
    }

    /// Generation of the last successful commit, -1 if none.
    pub fn generation(&self) -> i64 {
        self.generation
    }

    pub fn segments(&self) -> &[SegmentDescriptor] {
        &self.segments
    }

    /// Register a segment. It becomes durable with the next [`write`](Self::write).
    pub fn add(&mut self, segment: SegmentDescriptor) {
        self.segments.push(segment);
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments not marked deleted.
    pub fn live_segments(&self) -> impl Iterator<Item = &SegmentDescriptor> {
        self.segments.iter().filter(|segment| !segment.is_deleted())
    }

    /// Documents across live segments.
    pub fn total_documents(&self) -> u64 {
        self.live_segments()
            .map(|segment| segment.document_count() as u64)
            .sum()
    }

    /// One past the largest `segment_N` number in the set.
    pub fn next_segment_number(&self) -> u64 {
        self.segments
            .iter()
            .filter_map(SegmentDescriptor::segment_number)
            .max()
            .map_or(0, |number| number + 1)
    }
}

fn read_generation(storage: &dyn Storage) -> Result<i64> {
    let mut input = storage.open_input(SEGMENTS_GEN)?;
    let mut text = String::new();
    input.read_to_string(&mut text).map_err(|err| {
        TesseraError::corruption(format!("{SEGMENTS_GEN} is not readable text: {err}"))
    })?;
    input.close()?;

    let generation: i64 = text.trim().parse().map_err(|_| {
        TesseraError::corruption(format!("{SEGMENTS_GEN} holds {text:?}, not a generation"))
    })?;
    if generation < 0 {
        return Err(TesseraError::corruption(format!(
            "{SEGMENTS_GEN} holds negative generation {generation}"
        )));
    }
    Ok(generation)
}

fn discard_temp(storage: &dyn Storage, temp: &str) {
    if storage.file_exists(temp)
        && let Err(err) = storage.delete_file(temp)
    {
        warn!("Failed to delete temp file {temp}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentMetadata;
    use crate::storage::memory::MemoryStorage;

    fn descriptor(number: u64, docs: i32) -> SegmentDescriptor {
        let meta = SegmentMetadata::new(1_000, docs, 0, docs.max(1) - 1).unwrap();
        let mut desc = SegmentDescriptor::new(SegmentDescriptor::segment_name(number), &meta);
        desc.set_size_in_bytes(100 + number).unwrap();
        desc
    }

    fn read_text(storage: &MemoryStorage, name: &str) -> String {
        let mut text = String::new();
        storage
            .open_input(name)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    #[test]
    fn test_fresh_index_is_empty() {
        let storage = MemoryStorage::new_default();
        let set = SegmentSet::read_latest(&storage).unwrap();
        assert_eq!(set.generation(), -1);
        assert!(set.is_empty());
        assert_eq!(set.next_segment_number(), 0);
    }

    #[test]
    fn test_write_and_read_latest() {
        let storage = MemoryStorage::new_default();
        let mut set = SegmentSet::new();
        set.add(descriptor(0, 2));
        set.write(&storage).unwrap();
        assert_eq!(set.generation(), 0);

        set.add(descriptor(1, 3));
        set.write(&storage).unwrap();
        assert_eq!(set.generation(), 1);

        assert_eq!(read_text(&storage, SEGMENTS_GEN), "1");
        assert!(storage.file_exists("segments_0"));
        assert!(storage.file_exists("segments_1"));

        let loaded = SegmentSet::read_latest(&storage).unwrap();
        assert_eq!(loaded, set);
        assert_eq!(loaded.total_documents(), 5);
        assert_eq!(loaded.next_segment_number(), 2);

        // No temp files survive a commit.
        let files = storage.list_files().unwrap();
        assert!(files.iter().all(|name| !name.ends_with(".tmp")), "{files:?}");
    }

    #[test]
    fn test_live_segments_skip_deleted() {
        let mut set = SegmentSet::new();
        set.add(descriptor(0, 4));
        let mut deleted = descriptor(1, 6);
        deleted.mark_deleted();
        set.add(deleted);

        assert_eq!(set.len(), 2);
        assert_eq!(set.live_segments().count(), 1);
        assert_eq!(set.total_documents(), 4);
    }

    #[test]
    fn test_dangling_pointer_is_corruption() {
        let storage = MemoryStorage::new_default();
        let mut output = storage.create_output(SEGMENTS_GEN).unwrap();
        output.write_all(b"3").unwrap();
        output.close().unwrap();

        let err = SegmentSet::read_latest(&storage).unwrap_err();
        assert!(matches!(err, TesseraError::Corruption(_)), "{err}");
    }

    #[test]
    fn test_garbage_pointer_is_corruption() {
        let storage = MemoryStorage::new_default();
        let mut output = storage.create_output(SEGMENTS_GEN).unwrap();
        output.write_all(b"not a number").unwrap();
        output.close().unwrap();

        assert!(matches!(
            SegmentSet::read_latest(&storage),
            Err(TesseraError::Corruption(_))
        ));
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let storage = MemoryStorage::new_default();
        let mut set = SegmentSet::new();
        set.add(descriptor(0, 2));
        set.write(&storage).unwrap();

        // Inside the first descriptor's creation time.
        storage.corrupt_byte("segments_0", 32, 0xFF).unwrap();
        let err = SegmentSet::read_latest(&storage).unwrap_err();
        assert!(matches!(err, TesseraError::Corruption(_)), "{err}");
    }

    #[test]
    fn test_failed_commit_keeps_generation() {
        let storage = MemoryStorage::new_default();
        let mut set = SegmentSet::new();
        set.add(descriptor(0, 1));
        set.write(&storage).unwrap();

        storage.close().unwrap();
        assert!(set.write(&storage).is_err());
        assert_eq!(set.generation(), 0);
    }
}
