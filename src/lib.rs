//! litdex: a segmented full-text search engine for static book corpora.
//!
//! ## Architecture
//! - Indexing: Analyzer -> Chunker -> per-batch accumulator -> Segment writer -> Manifest
//! - Search: query -> Analyzer -> per-segment BM25 (parallel) -> top-K merge
//! - Optional NRT layer: in-memory delta index + write-ahead log, federated with disk segments

pub mod analyzer;
pub mod batch_indexer;
pub mod cache;
pub mod chunker;
pub mod codec;
pub mod config;
pub mod error;
pub mod manifest;
pub mod nrt;
pub mod searcher;
pub mod segment;
pub mod wal;

pub use batch_indexer::{index_corpus, reclaim_orphaned_segments, Document, DuplicateIndex, IndexStats};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use nrt::NrtIndexer;
pub use searcher::Hit;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use analyzer::Analyzer;
use cache::PostingsCache;
use manifest::Manifest;
use segment::SegmentReader;

const DEFAULT_POSTINGS_CACHE_CAPACITY: usize = 4096;

/// Opens a previously indexed corpus for read-only search.
pub struct Searcher {
    manifest: Arc<Manifest>,
    segments: Vec<Arc<SegmentReader>>,
    analyzer: Analyzer,
    cache: PostingsCache,
}

impl Searcher {
    /// Opens `index_dir`, mapping every committed segment listed in its
    /// manifest. Fails if the manifest is missing or any listed segment
    /// cannot be opened.
    pub fn open(index_dir: impl AsRef<Path>) -> Result<Self> {
        let index_dir: &Path = index_dir.as_ref();
        let manifest = Arc::new(Manifest::open_existing(index_dir)?);
        let record = manifest.record();

        let mut segments = Vec::with_capacity(record.segments.len());
        for (id, name) in record.segments.iter().enumerate() {
            let dir: PathBuf = index_dir.join(name);
            segments.push(Arc::new(SegmentReader::open(&dir, id as u32)?));
        }

        Ok(Self {
            manifest,
            segments,
            analyzer: Analyzer::empty(),
            cache: PostingsCache::new(DEFAULT_POSTINGS_CACHE_CAPACITY),
        })
    }

    /// Overrides the query-time stop-word set. Must match the set used at
    /// index time for scores to be meaningful.
    pub fn set_stopwords(&mut self, stopwords: std::collections::HashSet<String>) {
        self.analyzer = Analyzer::new(Arc::new(stopwords));
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<Hit>> {
        if top_k == 0 {
            return Err(EngineError::BadInput("top_k must be positive".into()));
        }
        let terms = self.analyzer.analyze(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let record = self.manifest.record();
        searcher::search_segments(
            &self.segments,
            &terms,
            top_k,
            record.total_docs,
            record.avgdl(),
            record.k1,
            record.b,
            Some(&self.cache),
        )
    }

    /// The open segment readers, for callers (e.g. the NRT layer) that need
    /// to federate a search across disk segments themselves.
    pub fn segments(&self) -> &[Arc<SegmentReader>] {
        &self.segments
    }

    pub fn cache_stats(&self) -> cache::CacheStats {
        self.cache.stats()
    }

    pub fn total_docs(&self) -> u64 {
        self.manifest.record().total_docs
    }
}
