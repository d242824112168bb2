use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

use tempfile::tempdir;

use tessera::analysis::WhitespaceAnalyzer;
use tessera::document::Document;
use tessera::error::{ErrorKind, Result, TesseraError};
use tessera::index::{IndexWriter, IndexWriterConfig, NoMergePolicy};
use tessera::segment::{FileKind, SegmentFile, SegmentReader};
use tessera::storage::Storage;
use tessera::storage::file::FileStorage;

fn write_segment(storage: Arc<dyn Storage>) -> Result<()> {
    let config = IndexWriterConfig::new(
        Arc::new(WhitespaceAnalyzer::new()),
        Arc::new(NoMergePolicy::new()),
        100,
    )?;
    let mut writer = IndexWriter::new(storage, config)?;
    writer.add_document(
        Document::builder(0)
            .add_text("title", "Alpha beta")
            .add_numeric("rank", 7)
            .build(),
    )?;
    writer.add_document(
        Document::builder(2)
            .add_text("title", "beta gamma beta")
            .add_binary("thumb", vec![0xFF, 0x00])
            .build(),
    )?;
    writer.commit()
}

fn flip_byte(path: &std::path::Path, offset: u64) -> Result<()> {
    let mut data = fs::read(path)?;
    data[offset as usize] ^= 0xFF;
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&data)?;
    Ok(())
}

#[test]
fn test_every_file_opens_as_its_kind() -> Result<()> {
    let dir = tempdir()?;
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path())?);
    write_segment(Arc::clone(&storage))?;

    for kind in FileKind::ALL {
        let mut file = SegmentFile::open(storage.as_ref(), &kind.file_name("segment_0"))?;
        assert_eq!(file.kind(), kind);
        file.close()?;
        file.close()?;
    }

    let doc = SegmentFile::open(storage.as_ref(), "segment_0.doc")?;
    assert_eq!(doc.header().record_count, 2);
    let dic = SegmentFile::open(storage.as_ref(), "segment_0.dic")?;
    // Whitespace analysis keeps case: Alpha, beta, gamma.
    assert_eq!(dic.header().record_count, 3);
    Ok(())
}

#[test]
fn test_segment_reader_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path())?);
    write_segment(Arc::clone(&storage))?;

    let mut reader = SegmentReader::open(storage.as_ref(), "segment_0")?;
    let beta = reader.postings("title", "beta")?;
    assert_eq!(beta.len(), 2);
    assert_eq!(beta[0].positions(), &[6]);
    assert_eq!(beta[1].doc_id(), 2);
    assert_eq!(beta[1].frequency(), 2);
    assert_eq!(beta[1].positions(), &[0, 11]);

    assert!(reader.find_term("title", "alpha")?.is_none());
    assert!(reader.find_term("body", "beta")?.is_none());

    let terms: Vec<_> = reader
        .terms()?
        .iter()
        .map(|t| t.text().to_string())
        .collect();
    assert_eq!(terms, vec!["Alpha", "beta", "gamma"]);

    let documents = reader.documents()?;
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].get_field("rank").and_then(|v| v.as_numeric()), Some(7));
    assert_eq!(
        documents[1].get_field("thumb").and_then(|v| v.as_binary()),
        Some(&[0xFF, 0x00][..])
    );
    reader.close()
}

#[test]
fn test_bad_magic_is_reported_as_header_error() -> Result<()> {
    let dir = tempdir()?;
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path())?);
    write_segment(Arc::clone(&storage))?;

    flip_byte(&dir.path().join("segment_0.post"), 0)?;
    let err = SegmentFile::open(storage.as_ref(), "segment_0.post").unwrap_err();
    assert!(matches!(err, TesseraError::InvalidHeader { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::Corruption);
    assert!(!err.is_retryable());
    Ok(())
}

#[test]
fn test_corrupt_metadata_blocks_segment_open() -> Result<()> {
    let dir = tempdir()?;
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path())?);
    write_segment(Arc::clone(&storage))?;

    // First byte of the document count inside the meta record.
    flip_byte(&dir.path().join("segment_0.meta"), 25 + 8)?;
    let err = SegmentReader::open(storage.as_ref(), "segment_0").unwrap_err();
    assert!(matches!(err, TesseraError::CorruptMetadata(_)), "{err}");
    Ok(())
}

#[test]
fn test_renamed_file_fails_type_check() -> Result<()> {
    let dir = tempdir()?;
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path())?);
    write_segment(Arc::clone(&storage))?;

    storage.delete_file("segment_0.meta")?;
    storage.rename_file("segment_0.dic", "segment_0.meta")?;
    let err = SegmentReader::open(storage.as_ref(), "segment_0").unwrap_err();
    assert!(matches!(err, TesseraError::InvalidHeader { .. }), "{err}");
    Ok(())
}
