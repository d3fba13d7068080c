//! Near-real-time indexing: an in-memory delta index backed by a
//! write-ahead log, searched alongside the on-disk segments.
//!
//! Writers (`add_document`, `flush`) take an exclusive lock; readers
//! (`search`) take a shared lock, so a concurrent search observes either a
//! fully-applied `add_document` or none of it, never a partial one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::analyzer::Analyzer;
use crate::cache::PostingsCache;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::searcher::{self, bm25_term_score, idf, Hit};
use crate::segment::{ChunkEntry, SegmentReader};
use crate::wal::{self, Wal, WalRecord};

const WAL_FILE: &str = "wal";

struct RamIndex {
    base_chunk_id: u64,
    terms: AHashMap<String, Vec<(u64, u32)>>,
    chunks: Vec<ChunkEntry>,
    total_length: u64,
}

impl RamIndex {
    fn new(base_chunk_id: u64) -> Self {
        Self {
            base_chunk_id,
            terms: AHashMap::new(),
            chunks: Vec::new(),
            total_length: 0,
        }
    }

    fn add(&mut self, analyzer: &Analyzer, book_id: String, text: &str) -> u64 {
        let chunk_id = self.base_chunk_id + self.chunks.len() as u64;
        let terms = analyzer.analyze(text);
        let length = terms.len() as u32;

        let mut term_freqs: AHashMap<&str, u32> = AHashMap::new();
        for term in &terms {
            *term_freqs.entry(term.as_str()).or_insert(0) += 1;
        }
        for (term, tf) in term_freqs {
            self.terms
                .entry(term.to_string())
                .or_default()
                .push((chunk_id, tf));
        }

        self.total_length += length as u64;
        self.chunks.push(ChunkEntry { book_id, length });
        chunk_id
    }

    fn search(&self, terms: &[String], top_k: usize, total_docs: u64, avgdl: f64, k1: f64, b: f64) -> Vec<Hit> {
        let mut scores: AHashMap<u64, f64> = AHashMap::new();
        for term in terms {
            let Some(postings) = self.terms.get(term) else {
                continue;
            };
            let df = postings.len() as u32;
            let term_idf = idf(total_docs, df);
            for &(chunk_id, tf) in postings {
                let local = (chunk_id - self.base_chunk_id) as usize;
                let dl = self.chunks.get(local).map(|c| c.length).unwrap_or(0);
                let contribution = bm25_term_score(term_idf, tf, dl, avgdl, k1, b);
                *scores.entry(chunk_id).or_insert(0.0) += contribution;
            }
        }

        let mut hits: Vec<Hit> = scores
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                let local = (chunk_id - self.base_chunk_id) as usize;
                self.chunks.get(local).map(|c| Hit {
                    book_id: c.book_id.clone(),
                    score,
                    chunk_id,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);
        hits
    }
}

/// A near-real-time layer over a disk-backed engine: newly added documents
/// are searchable immediately without rewriting any segment.
pub struct NrtIndexer {
    analyzer: Analyzer,
    manifest: Arc<Manifest>,
    wal: RwLock<Wal>,
    ram: RwLock<RamIndex>,
    k1: f64,
    b: f64,
}

impl NrtIndexer {
    /// Opens the NRT layer for `index_dir`, replaying its WAL into a fresh
    /// in-memory index. Fails with `WalCorrupt` if the WAL contains an
    /// internally malformed record; a truncated trailing record is dropped
    /// silently.
    pub fn open(index_dir: &Path, config: &EngineConfig) -> Result<Self> {
        let manifest = Arc::new(Manifest::open(index_dir, config.k1, config.b)?);
        let stopwords = config.load_stopwords()?;
        let analyzer = Analyzer::new(Arc::new(stopwords));

        let wal_path = index_dir.join(WAL_FILE);
        let records = wal::recover(&wal_path)?;

        let base_chunk_id = manifest.record().next_chunk_id;
        let mut ram = RamIndex::new(base_chunk_id);
        for record in records {
            ram.add(&analyzer, record.metadata, &record.text);
        }

        let wal = Wal::open(&wal_path)?;

        Ok(Self {
            analyzer,
            manifest,
            wal: RwLock::new(wal),
            ram: RwLock::new(ram),
            k1: config.k1,
            b: config.b,
        })
    }

    /// Appends `text` to the WAL (fsynced) and to the in-memory index under
    /// one exclusive lock, returning the new chunk id. `metadata` is stored
    /// verbatim and returned as the hit's `book_id`.
    pub fn add_document(&self, text: &str, metadata: &str) -> Result<u64> {
        let record = WalRecord {
            text: text.to_string(),
            metadata: metadata.to_string(),
        };
        self.wal.write().append(&record)?;

        let mut ram = self.ram.write();
        Ok(ram.add(&self.analyzer, metadata.to_string(), text))
    }

    /// Searches the on-disk segments and the in-memory index together,
    /// merging to a single top-K.
    pub fn search(
        &self,
        disk_segments: &[Arc<SegmentReader>],
        query: &str,
        top_k: usize,
        cache: Option<&PostingsCache>,
    ) -> Result<Vec<Hit>> {
        let terms = self.analyzer.analyze(query);
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let manifest_record = self.manifest.record();
        let ram = self.ram.read();

        let total_docs = manifest_record.total_docs + ram.chunks.len() as u64;
        let total_length = manifest_record.total_length + ram.total_length;
        let avgdl = if total_docs == 0 {
            0.0
        } else {
            total_length as f64 / total_docs as f64
        };

        let mut hits = searcher::search_segments(
            disk_segments,
            &terms,
            top_k,
            total_docs,
            avgdl,
            self.k1,
            self.b,
            cache,
        )?;
        hits.extend(ram.search(&terms, top_k, total_docs, avgdl, self.k1, self.b));

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Drops the in-memory index and truncates the WAL. Does not materialize
    /// a disk segment; that is a separate, explicit batch-index invocation.
    pub fn flush(&self) -> Result<u64> {
        let mut ram = self.ram.write();
        let mut wal = self.wal.write();
        let count = ram.chunks.len() as u64;
        let base_chunk_id = self.manifest.record().next_chunk_id;
        *ram = RamIndex::new(base_chunk_id);
        wal.truncate()?;
        Ok(count)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.wal.read().path().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use tempfile::TempDir;

    #[test]
    fn add_then_search_finds_document() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let nrt = NrtIndexer::open(dir.path(), &config).unwrap();

        let hits = nrt.search(&[], "python", 10, None).unwrap();
        assert!(hits.is_empty());

        nrt.add_document("python programming language", "book-python").unwrap();
        let hits = nrt.search(&[], "python", 10, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].book_id, "book-python");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn survives_restart_via_wal_replay() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::default();
        {
            let nrt = NrtIndexer::open(dir.path(), &config).unwrap();
            nrt.add_document("python programming", "book-1").unwrap();
            nrt.add_document("rust systems programming", "book-2").unwrap();
        }

        let reopened = NrtIndexer::open(dir.path(), &config).unwrap();
        let hits = reopened.search(&[], "programming", 10, None).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn flush_drops_ram_and_truncates_wal() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let nrt = NrtIndexer::open(dir.path(), &config).unwrap();
        nrt.add_document("python programming", "book-1").unwrap();

        let count = nrt.flush().unwrap();
        assert_eq!(count, 1);

        let hits = nrt.search(&[], "python", 10, None).unwrap();
        assert!(hits.is_empty());

        let reopened = NrtIndexer::open(dir.path(), &config).unwrap();
        let hits = reopened.search(&[], "python", 10, None).unwrap();
        assert!(hits.is_empty());
    }
}
