//! On-disk segment format: a self-contained, immutable inverted index built
//! from one batch of chunks.
//!
//! A segment directory holds:
//!
//! ```text
//! segment_00042/
//!     terms      - bincode Vec<TermEntry>, sorted by term, binary-searchable
//!     postings   - concatenated variable-byte postings blobs
//!     chunks     - bincode Vec<ChunkEntry>, indexed by local chunk ordinal
//!     stats      - bincode SegmentStats
//!     COMMIT     - zero-length sentinel; absence means the segment is orphaned
//! ```
//!
//! `COMMIT` is written last, after every content file has been flushed to
//! disk, so a segment directory missing it can be safely deleted on restart.

pub mod reader;
pub mod writer;

pub use reader::SegmentReader;
pub use writer::SegmentWriter;

use serde::{Deserialize, Serialize};

pub const TERMS_FILE: &str = "terms";
pub const POSTINGS_FILE: &str = "postings";
pub const CHUNKS_FILE: &str = "chunks";
pub const STATS_FILE: &str = "stats";
pub const COMMIT_FILE: &str = "COMMIT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermEntry {
    pub term: String,
    pub df: u32,
    pub offset: u64,
    pub length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkEntry {
    pub book_id: String,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentStats {
    pub chunk_count: u64,
    pub total_length: u64,
    pub base_chunk_id: u64,
}

/// Returns true if `dir` contains a complete, committed segment.
pub fn is_committed(dir: &std::path::Path) -> bool {
    dir.join(COMMIT_FILE).is_file()
}
