use criterion::{criterion_group, criterion_main, Criterion};
use litdex::{index_corpus, Document, EngineConfig, Searcher};
use tempfile::TempDir;

fn setup() -> (TempDir, Searcher) {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::default();
    let docs: Vec<Document> = (0..500)
        .map(|i| Document {
            book_id: format!("book-{i}"),
            text: "the quick brown fox jumps over the lazy dog ".repeat(30),
        })
        .collect();
    index_corpus(&config, dir.path(), docs, None).unwrap();
    let searcher = Searcher::open(dir.path()).unwrap();
    (dir, searcher)
}

fn bench_search(c: &mut Criterion) {
    let (_dir, searcher) = setup();
    c.bench_function("search_top10_single_segment", |b| {
        b.iter(|| {
            searcher.search("quick fox", 10).unwrap();
        });
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
