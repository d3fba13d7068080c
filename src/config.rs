//! Engine configuration
//!
//! Construction-time knobs for tokenization, chunking, batching, and BM25.
//! All defaults match the reference scoring formula and chunking scheme.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// BM25 term-frequency saturation parameter.
    pub k1: f64,
    /// BM25 length-normalization parameter.
    pub b: f64,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters of overlap between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks accumulated per segment before it is written.
    pub batch_size: usize,
    /// Indexing worker pool size.
    pub worker_count: usize,
    /// Optional path to a JSON stop-word file (array, or object of arrays by language).
    pub stopwords_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            chunk_size: 1000,
            chunk_overlap: 100,
            batch_size: 1000,
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            stopwords_path: None,
        }
    }
}

impl EngineConfig {
    /// Loads the configured stop-word set, or an empty set if none is configured.
    ///
    /// Accepts either a bare JSON array of words, or an object mapping language
    /// codes to arrays of words (all values are merged into one set), matching
    /// the shape of common multi-language stop-word dumps.
    pub fn load_stopwords(&self) -> Result<HashSet<String>> {
        match &self.stopwords_path {
            None => Ok(HashSet::new()),
            Some(path) => load_stopwords_file(path),
        }
    }
}

fn load_stopwords_file(path: &Path) -> Result<HashSet<String>> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let mut words = HashSet::new();
    collect_stopwords(&value, &mut words);
    Ok(words)
}

fn collect_stopwords(value: &serde_json::Value, out: &mut HashSet<String>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                if let Some(s) = item.as_str() {
                    out.insert(s.to_lowercase());
                }
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                collect_stopwords(v, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.k1, 1.5);
        assert_eq!(cfg.b, 0.75);
        assert_eq!(cfg.chunk_size, 1000);
        assert_eq!(cfg.chunk_overlap, 100);
        assert_eq!(cfg.batch_size, 1000);
    }

    #[test]
    fn no_stopwords_path_yields_empty_set() {
        let cfg = EngineConfig::default();
        let words = cfg.load_stopwords().unwrap();
        assert!(words.is_empty());
    }

    #[test]
    fn loads_array_stopwords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stopwords.json");
        std::fs::write(&path, r#"["The", "And", "Is"]"#).unwrap();
        let cfg = EngineConfig {
            stopwords_path: Some(path),
            ..EngineConfig::default()
        };
        let words = cfg.load_stopwords().unwrap();
        assert!(words.contains("the"));
        assert!(words.contains("and"));
        assert!(words.contains("is"));
    }

    #[test]
    fn loads_nested_language_stopwords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stopwords-iso.json");
        std::fs::write(&path, r#"{"en": ["the", "a"], "fr": ["le", "la"]}"#).unwrap();
        let cfg = EngineConfig {
            stopwords_path: Some(path),
            ..EngineConfig::default()
        };
        let words = cfg.load_stopwords().unwrap();
        assert_eq!(words.len(), 4);
        assert!(words.contains("le"));
    }
}
