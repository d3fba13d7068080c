//! Builds a single immutable segment from a batch of chunks.
//!
//! Grounded on the accumulate-then-flush shape of the reference full-text
//! index builder: a term→postings map grows entirely in memory for the
//! duration of one batch, then is serialized once.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::analyzer::Analyzer;
use crate::chunker::{self, RawChunk};
use crate::codec;
use crate::error::Result;
use crate::segment::{ChunkEntry, SegmentStats, TermEntry, CHUNKS_FILE, COMMIT_FILE, POSTINGS_FILE, STATS_FILE, TERMS_FILE};

pub struct SegmentWriter {
    dir: PathBuf,
    base_chunk_id: u64,
    analyzer: Analyzer,
    chunk_size: usize,
    chunk_overlap: usize,
    terms: BTreeMap<String, Vec<(u64, u32)>>, // term -> (local_chunk_id, tf), ascending
    chunks: Vec<ChunkEntry>,
    total_length: u64,
}

impl SegmentWriter {
    pub fn new(
        dir: impl Into<PathBuf>,
        base_chunk_id: u64,
        analyzer: Analyzer,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            dir: dir.into(),
            base_chunk_id,
            analyzer,
            chunk_size,
            chunk_overlap,
            terms: BTreeMap::new(),
            chunks: Vec::new(),
            total_length: 0,
        }
    }

    /// Chunks `text`, analyzes each chunk, and accumulates postings. Returns
    /// the number of chunks added.
    pub fn add_document(&mut self, book_id: &str, text: &str) -> usize {
        let raw_chunks = chunker::chunk(text, self.chunk_size, self.chunk_overlap);
        for RawChunk { text } in raw_chunks {
            self.add_chunk(book_id, &text);
        }
        self.chunks.len()
    }

    fn add_chunk(&mut self, book_id: &str, chunk_text: &str) {
        let local_id = self.chunks.len() as u64;
        let terms = self.analyzer.analyze(chunk_text);
        let length = terms.len() as u32;

        let mut term_freqs: ahash::AHashMap<&str, u32> = ahash::AHashMap::new();
        for term in &terms {
            *term_freqs.entry(term.as_str()).or_insert(0) += 1;
        }
        for (term, tf) in term_freqs {
            self.terms
                .entry(term.to_string())
                .or_default()
                .push((local_id, tf));
        }

        self.total_length += length as u64;
        self.chunks.push(ChunkEntry {
            book_id: book_id.to_string(),
            length,
        });
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Serializes the batch to `self.dir`: content files first (each fsynced),
    /// then the `COMMIT` sentinel last. A crash before `COMMIT` is written
    /// leaves an orphaned, recognizably incomplete directory.
    pub fn finish(self) -> Result<SegmentStats> {
        fs::create_dir_all(&self.dir)?;

        let mut postings_blob = Vec::new();
        let mut term_entries = Vec::with_capacity(self.terms.len());

        for (term, mut local_postings) in self.terms {
            local_postings.sort_by_key(|&(local_id, _)| local_id);
            let global: Vec<(u64, u32)> = local_postings
                .into_iter()
                .map(|(local_id, tf)| (self.base_chunk_id + local_id, tf))
                .collect();
            let df = global.len() as u32;
            let encoded = codec::encode(&global);
            let offset = postings_blob.len() as u64;
            let length = encoded.len() as u32;
            postings_blob.extend_from_slice(&encoded);
            term_entries.push(TermEntry {
                term,
                df,
                offset,
                length,
            });
        }
        // Already ascending: BTreeMap iterates in sorted term order.

        write_fsynced(&self.dir.join(POSTINGS_FILE), &postings_blob)?;
        write_bincode_fsynced(&self.dir.join(TERMS_FILE), &term_entries)?;
        write_bincode_fsynced(&self.dir.join(CHUNKS_FILE), &self.chunks)?;

        let stats = SegmentStats {
            chunk_count: self.chunks.len() as u64,
            total_length: self.total_length,
            base_chunk_id: self.base_chunk_id,
        };
        write_bincode_fsynced(&self.dir.join(STATS_FILE), &stats)?;

        // COMMIT last: marks this directory as a complete, readable segment.
        let commit_path = self.dir.join(COMMIT_FILE);
        let f = File::create(&commit_path)?;
        f.sync_all()?;

        Ok(stats)
    }
}

fn write_fsynced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    Ok(())
}

fn write_bincode_fsynced<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    write_fsynced(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builds_committed_segment() {
        let dir = TempDir::new().unwrap();
        let seg_dir = dir.path().join("segment_00000");
        let mut w = SegmentWriter::new(&seg_dir, 0, Analyzer::empty(), 1000, 100);
        w.add_document("book-1", "liberty and justice for all");
        w.add_document("book-2", "justice delayed is justice denied");
        let stats = w.finish().unwrap();

        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.base_chunk_id, 0);
        assert!(crate::segment::is_committed(&seg_dir));
        assert!(seg_dir.join(TERMS_FILE).is_file());
        assert!(seg_dir.join(POSTINGS_FILE).is_file());
        assert!(seg_dir.join(CHUNKS_FILE).is_file());
    }

    #[test]
    fn empty_document_contributes_no_chunks() {
        let dir = TempDir::new().unwrap();
        let mut w = SegmentWriter::new(dir.path(), 0, Analyzer::empty(), 1000, 100);
        w.add_document("book-1", "   ");
        assert!(w.is_empty());
    }

    #[test]
    fn terms_are_sorted_alphabetically() {
        let dir = TempDir::new().unwrap();
        let seg_dir = dir.path().join("seg");
        let mut w = SegmentWriter::new(&seg_dir, 0, Analyzer::empty(), 1000, 100);
        w.add_document("book-1", "zebra apple mango");
        w.finish().unwrap();

        let bytes = fs::read(seg_dir.join(TERMS_FILE)).unwrap();
        let entries: Vec<TermEntry> = bincode::deserialize(&bytes).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.term.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
