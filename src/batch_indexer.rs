//! Parallel pipeline that turns a stream of documents into committed
//! segments and publishes them to the manifest.
//!
//! Workers share no mutable state: each owns its batch's term accumulator
//! until the segment is finished, and only briefly contends on the manifest
//! lock at publish time.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;

use crate::analyzer::Analyzer;
use crate::chunker;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::segment::SegmentWriter;

#[derive(Debug, Clone)]
pub struct Document {
    pub book_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    pub documents_indexed: u64,
    pub chunks_written: u64,
    pub segments_written: u64,
}

/// Tracks content hashes of already-indexed documents so repeated
/// `index_corpus` runs over a partially-overlapping corpus skip unchanged
/// books.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct DuplicateIndex {
    seen: std::collections::HashMap<String, u64>,
}

impl DuplicateIndex {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn hash_of(text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns true and records the hash if `book_id`/`text` is new or changed.
    fn mark_if_new(&mut self, book_id: &str, text: &str) -> bool {
        let hash = Self::hash_of(text);
        match self.seen.get(book_id) {
            Some(&existing) if existing == hash => false,
            _ => {
                self.seen.insert(book_id.to_string(), hash);
                true
            }
        }
    }
}

struct Batch {
    index: u64,
    base_chunk_id: u64,
    documents: Vec<Document>,
}

/// Partitions `documents` into batches of roughly `batch_size` chunks each,
/// pre-chunking to count without yet running the analyzer.
fn plan_batches(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
    batch_size: usize,
    starting_chunk_id: u64,
    starting_segment_index: u64,
) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_chunks = 0usize;
    let mut base_chunk_id = starting_chunk_id;
    let mut segment_index = starting_segment_index;

    for doc in documents {
        let n = chunker::chunk(&doc.text, chunk_size, chunk_overlap).len();
        if n == 0 {
            continue;
        }
        if current_chunks > 0 && current_chunks + n > batch_size {
            let count = current_chunks as u64;
            batches.push(Batch {
                index: segment_index,
                base_chunk_id,
                documents: std::mem::take(&mut current),
            });
            base_chunk_id += count;
            segment_index += 1;
            current_chunks = 0;
        }
        current_chunks += n;
        current.push(doc.clone());
    }

    if !current.is_empty() {
        batches.push(Batch {
            index: segment_index,
            base_chunk_id,
            documents: current,
        });
    }

    batches
}

/// Builds segments for `documents` under `index_dir` and publishes them to
/// the manifest. Batches build and commit in parallel; each publishes to the
/// manifest independently as soon as it is ready, so commit order may differ
/// from submission order.
pub fn index_corpus(
    config: &EngineConfig,
    index_dir: &Path,
    documents: Vec<Document>,
    dup_index: Option<&mut DuplicateIndex>,
) -> Result<IndexStats> {
    let stopwords = config.load_stopwords()?;
    let analyzer = Analyzer::new(Arc::new(stopwords));

    let documents = match dup_index {
        Some(index) => {
            let filtered: Vec<Document> = documents
                .into_iter()
                .filter(|d| index.mark_if_new(&d.book_id, &d.text))
                .collect();
            filtered
        }
        None => documents,
    };

    let manifest = Arc::new(Manifest::open(index_dir, config.k1, config.b)?);
    let starting_record = manifest.record();
    let starting_segment_index = starting_record.segments.len() as u64;
    let starting_chunk_id = starting_record.next_chunk_id;

    let batches = plan_batches(
        &documents,
        config.chunk_size,
        config.chunk_overlap,
        config.batch_size,
        starting_chunk_id,
        starting_segment_index,
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_count.max(1))
        .build()
        .map_err(|e| crate::error::EngineError::BadInput(e.to_string()))?;

    let documents_indexed = documents.len() as u64;
    let results: Vec<Result<(u64, u64)>> = pool.install(|| {
        batches
            .into_par_iter()
            .map(|batch| build_and_publish(index_dir, &analyzer, config, &manifest, batch))
            .collect()
    });

    let mut chunks_written = 0u64;
    let mut segments_written = 0u64;
    for result in results {
        let (docs, chunks) = result?;
        let _ = docs;
        chunks_written += chunks;
        if chunks > 0 {
            segments_written += 1;
        }
    }

    info!(
        "indexed {documents_indexed} documents into {segments_written} segments ({chunks_written} chunks)"
    );

    Ok(IndexStats {
        documents_indexed,
        chunks_written,
        segments_written,
    })
}

fn build_and_publish(
    index_dir: &Path,
    analyzer: &Analyzer,
    config: &EngineConfig,
    manifest: &Manifest,
    batch: Batch,
) -> Result<(u64, u64)> {
    let segment_name = format!("segment_{:05}", batch.index);
    let segment_dir: PathBuf = index_dir.join(&segment_name);

    let mut writer = SegmentWriter::new(
        &segment_dir,
        batch.base_chunk_id,
        analyzer.clone(),
        config.chunk_size,
        config.chunk_overlap,
    );

    for doc in &batch.documents {
        writer.add_document(&doc.book_id, &doc.text);
    }

    if writer.is_empty() {
        return Ok((0, 0));
    }

    let stats = writer.finish()?;
    manifest.publish_segment(&segment_name, stats.chunk_count, stats.total_length)?;
    info!("published {segment_name}: {} chunks", stats.chunk_count);

    Ok((batch.documents.len() as u64, stats.chunk_count))
}

/// Deletes any segment directory under `index_dir` that lacks a `COMMIT`
/// sentinel, i.e. was left behind by a crash mid-batch.
pub fn reclaim_orphaned_segments(index_dir: &Path) -> Result<u64> {
    let mut reclaimed = 0u64;
    if !index_dir.is_dir() {
        return Ok(0);
    }
    for entry in fs::read_dir(index_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && !crate::segment::is_committed(&path) {
            warn!("removing orphaned segment directory {}", path.display());
            fs::remove_dir_all(&path)?;
            reclaimed += 1;
        }
    }
    Ok(reclaimed)
}
