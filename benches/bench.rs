//! Criterion benchmarks for Tessera.
//!
//! Covers the hot paths of the write side:
//! - Text analysis
//! - Term dictionary lookups through the block index
//! - Posting list encoding
//! - Whole-segment flushes

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tessera::analysis::{Analyzer, StandardAnalyzer};
use tessera::document::Document;
use tessera::index::{IndexWriter, IndexWriterConfig, NoMergePolicy};
use tessera::segment::{Posting, PostingWriter, Term, TermDictionaryWriter};
use tessera::storage::Storage;
use tessera::storage::memory::MemoryStorage;

/// Generate test documents for benchmarking.
fn generate_test_documents(count: usize) -> Vec<String> {
    let words = [
        "segment", "posting", "term", "dictionary", "block", "prefix", "generation", "commit",
        "flush", "buffer", "analyzer", "token", "offset", "checksum", "header", "magic",
        "storage", "rename", "atomic", "merge", "policy", "document", "field", "position",
    ];

    let mut documents = Vec::with_capacity(count);
    for i in 0..count {
        let doc_length = 50 + (i % 100);
        let doc_words: Vec<&str> = (0..doc_length)
            .map(|j| words[(i * 7 + j * 13) % words.len()])
            .collect();
        documents.push(doc_words.join(" "));
    }

    documents
}

fn storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::new_default())
}

/// Benchmark text analysis.
fn bench_text_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_analysis");

    let analyzer = StandardAnalyzer::new();
    let texts = generate_test_documents(100);

    group.throughput(Throughput::Elements(100));
    group.bench_function("analyze_batch_documents", |b| {
        b.iter(|| {
            for text in &texts {
                let tokens = analyzer.analyze(black_box(text)).unwrap().count();
                black_box(tokens);
            }
        })
    });

    group.finish();
}

/// Benchmark dictionary lookups.
fn bench_dictionary_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dictionary");

    let storage = storage();
    let mut writer = TermDictionaryWriter::create(Arc::clone(&storage), "bench").unwrap();
    let terms: Vec<Term> = (0..10_000)
        .map(|i| Term::with_postings("body", format!("term{i:06}"), 1, i as u64))
        .collect();
    writer.add_terms(terms).unwrap();
    let mut reader = writer.complete().unwrap();

    group.throughput(Throughput::Elements(100));
    group.bench_function("find_term_hits", |b| {
        b.iter(|| {
            for i in (0..10_000).step_by(100) {
                let term = reader.find_term("body", &format!("term{i:06}")).unwrap();
                black_box(term);
            }
        })
    });

    group.bench_function("find_term_misses", |b| {
        b.iter(|| {
            for i in (0..10_000).step_by(100) {
                let term = reader.find_term("body", &format!("term{i:06}x")).unwrap();
                black_box(term);
            }
        })
    });

    group.finish();
}

/// Benchmark posting list encoding.
fn bench_posting_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("postings");

    let postings: Vec<Posting> = (0..1000)
        .map(|doc| Posting::new(doc * 3, vec![1, 5, 9, 40]).unwrap())
        .collect();

    group.throughput(Throughput::Elements(postings.len() as u64));
    group.bench_function("write_posting_list", |b| {
        b.iter_with_setup(
            || PostingWriter::create(storage(), "bench").unwrap(),
            |mut writer| {
                let offset = writer.write_posting_list(black_box(&postings)).unwrap();
                black_box(offset);
            },
        )
    });

    group.finish();
}

/// Benchmark flushing a full buffer into a segment.
fn bench_segment_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_flush");
    group.sample_size(20);

    let texts = generate_test_documents(200);

    group.throughput(Throughput::Elements(texts.len() as u64));
    group.bench_function("flush_200_documents", |b| {
        b.iter_with_setup(
            || {
                let config = IndexWriterConfig::new(
                    Arc::new(StandardAnalyzer::new()),
                    Arc::new(NoMergePolicy::new()),
                    usize::MAX,
                )
                .unwrap();
                IndexWriter::new(storage(), config).unwrap()
            },
            |mut writer| {
                for (id, text) in texts.iter().enumerate() {
                    let document = Document::builder(id as i32).add_text("body", text.as_str()).build();
                    writer.add_document(document).unwrap();
                }
                writer.flush().unwrap();
                black_box(writer);
            },
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_text_analysis,
    bench_dictionary_lookup,
    bench_posting_lists,
    bench_segment_flush
);
criterion_main!(benches);
