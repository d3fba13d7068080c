//! BM25 scoring: per-segment top-K, and a multi-segment fan-out/merge.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use ahash::AHashMap;
use rayon::prelude::*;

use crate::cache::PostingsCache;
use crate::error::Result;
use crate::segment::SegmentReader;

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub book_id: String,
    pub score: f64,
    pub chunk_id: u64,
}

/// Ordered so that "greater" means "worse": lower score is greater, and on a
/// score tie, a larger chunk_id is greater. `BinaryHeap::pop` then always
/// evicts the single worst-ranked candidate, which is exactly what bounding
/// the heap to `top_k` entries needs. `into_sorted_vec` consequently yields
/// entries best-first (score desc, chunk_id asc).
#[derive(Debug, Clone, PartialEq)]
struct HeapEntry {
    score: f64,
    chunk_id: u64,
    book_id: String,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.score.partial_cmp(&self.score).unwrap_or(Ordering::Equal) {
            Ordering::Equal => self.chunk_id.cmp(&other.chunk_id),
            ord => ord,
        }
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn idf(total_docs: u64, df: u32) -> f64 {
    ((total_docs as f64 - df as f64 + 0.5) / (df as f64 + 0.5) + 1.0).ln()
}

pub(crate) fn bm25_term_score(idf: f64, tf: u32, dl: u32, avgdl: f64, k1: f64, b: f64) -> f64 {
    let tf = tf as f64;
    let norm = 1.0 - b + b * (dl as f64 / avgdl.max(1e-9));
    idf * (tf * (k1 + 1.0)) / (tf + k1 * norm)
}

/// Scores every chunk in `reader` against `terms` and returns the top `k`.
pub fn search_segment(
    reader: &SegmentReader,
    terms: &[String],
    top_k: usize,
    total_docs: u64,
    avgdl: f64,
    k1: f64,
    b: f64,
    cache: Option<&PostingsCache>,
) -> Result<Vec<Hit>> {
    let stats = reader.stats();
    let base = stats.base_chunk_id;
    let mut scores: AHashMap<u64, f64> = AHashMap::new();

    for term in terms {
        let (df, postings) = match cache.and_then(|c| c.get(reader.id(), term)) {
            Some(cached) => match reader.term_df(term) {
                Some(df) => (df, cached),
                None => continue,
            },
            None => match reader.lookup(term)? {
                Some((df, postings)) => {
                    let postings = Arc::new(postings);
                    if let Some(c) = cache {
                        c.insert(reader.id(), term, Arc::clone(&postings));
                    }
                    (df, postings)
                }
                None => continue,
            },
        };

        let term_idf = idf(total_docs, df);
        for &(chunk_id, tf) in postings.iter() {
            let local_id = chunk_id - base;
            let dl = reader
                .chunk(local_id)
                .map(|c| c.length)
                .unwrap_or(0);
            let contribution = bm25_term_score(term_idf, tf, dl, avgdl, k1, b);
            *scores.entry(chunk_id).or_insert(0.0) += contribution;
        }
    }

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(top_k + 1);
    for (chunk_id, score) in scores {
        let local_id = chunk_id - base;
        let book_id = match reader.chunk(local_id) {
            Some(c) => c.book_id.clone(),
            None => continue,
        };
        heap.push(HeapEntry {
            score,
            chunk_id,
            book_id,
        });
        if heap.len() > top_k {
            heap.pop();
        }
    }

    let mut hits: Vec<Hit> = heap
        .into_sorted_vec()
        .into_iter()
        .map(|e| Hit {
            book_id: e.book_id,
            score: e.score,
            chunk_id: e.chunk_id,
        })
        .collect();
    hits.truncate(top_k);
    Ok(hits)
}

/// Fans a query out across every segment concurrently and merges the
/// per-segment top-K into an overall top-K.
pub fn search_segments(
    readers: &[Arc<SegmentReader>],
    terms: &[String],
    top_k: usize,
    total_docs: u64,
    avgdl: f64,
    k1: f64,
    b: f64,
    cache: Option<&PostingsCache>,
) -> Result<Vec<Hit>> {
    if terms.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let partials: Vec<Result<Vec<Hit>>> = readers
        .par_iter()
        .map(|reader| {
            search_segment(reader, terms, top_k, total_docs, avgdl, k1, b, cache)
        })
        .collect();

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(top_k + 1);
    for partial in partials {
        for hit in partial? {
            heap.push(HeapEntry {
                score: hit.score,
                chunk_id: hit.chunk_id,
                book_id: hit.book_id,
            });
            if heap.len() > top_k {
                heap.pop();
            }
        }
    }

    let mut hits: Vec<Hit> = heap
        .into_sorted_vec()
        .into_iter()
        .map(|e| Hit {
            book_id: e.book_id,
            score: e.score,
            chunk_id: e.chunk_id,
        })
        .collect();
    hits.truncate(top_k);
    Ok(hits)
}
