//! Memory-maps a committed segment and resolves terms to postings lazily.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use crate::codec;
use crate::error::{EngineError, Result};
use crate::segment::{
    ChunkEntry, SegmentStats, TermEntry, CHUNKS_FILE, POSTINGS_FILE, STATS_FILE, TERMS_FILE,
};

/// An open, immutable segment. Safe for unlimited concurrent reads.
pub struct SegmentReader {
    id: u32,
    postings_mmap: Mmap,
    terms: Vec<TermEntry>,
    chunks: Vec<ChunkEntry>,
    stats: SegmentStats,
}

impl SegmentReader {
    /// Opens a previously committed segment directory.
    ///
    /// `id` is a small per-engine identifier used only to namespace postings
    /// cache entries; it carries no on-disk meaning.
    pub fn open(dir: &Path, id: u32) -> Result<Self> {
        if !super::is_committed(dir) {
            return Err(EngineError::SegmentNotFound(dir.to_path_buf()));
        }

        let postings_file = File::open(dir.join(POSTINGS_FILE))?;
        // SAFETY: the postings file is write-once and never reopened for
        // writing after COMMIT is present.
        let postings_mmap = unsafe { Mmap::map(&postings_file)? };

        let terms: Vec<TermEntry> = read_bincode(&dir.join(TERMS_FILE))?;
        let chunks: Vec<ChunkEntry> = read_bincode(&dir.join(CHUNKS_FILE))?;
        let stats: SegmentStats = read_bincode(&dir.join(STATS_FILE))?;

        Ok(Self {
            id,
            postings_mmap,
            terms,
            chunks,
            stats,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn stats(&self) -> SegmentStats {
        self.stats
    }

    /// Binary-searches the term dictionary without decoding postings.
    pub fn term_df(&self, term: &str) -> Option<u32> {
        self.terms
            .binary_search_by(|e| e.term.as_str().cmp(term))
            .ok()
            .map(|idx| self.terms[idx].df)
    }

    /// Binary-searches the term dictionary and decodes the matching postings.
    pub fn lookup(&self, term: &str) -> Result<Option<(u32, Vec<(u64, u32)>)>> {
        let idx = match self.terms.binary_search_by(|e| e.term.as_str().cmp(term)) {
            Ok(idx) => idx,
            Err(_) => return Ok(None),
        };
        let entry = &self.terms[idx];
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        let bytes = self
            .postings_mmap
            .get(start..end)
            .ok_or_else(|| EngineError::InvalidPostings("offset out of bounds".into()))?;
        let postings = codec::decode(bytes)?;
        Ok(Some((entry.df, postings)))
    }

    pub fn chunk(&self, local_id: u64) -> Option<&ChunkEntry> {
        self.chunks.get(local_id as usize)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }
}

fn read_bincode<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let bytes = std::fs::read(path)?;
    bincode::deserialize(&bytes).map_err(Into::into)
}

/// Shared handle to an open segment, cheap to clone across search threads.
pub type SharedSegmentReader = Arc<SegmentReader>;
