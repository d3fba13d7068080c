//! The manifest: a single atomically-published record of which segments
//! make up the index, plus corpus-wide statistics.
//!
//! Publishing a new manifest writes `manifest.tmp`, fsyncs it, and renames
//! it over `manifest`. `rename()` is atomic on POSIX filesystems, so a crash
//! at any point leaves either the old manifest or the new one intact, never
//! a half-written file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

const MANIFEST_FILE: &str = "manifest";
const MANIFEST_TMP_FILE: &str = "manifest.tmp";
const MANIFEST_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestRecord {
    pub version: u16,
    pub total_docs: u64,
    pub total_length: u64,
    pub k1: f64,
    pub b: f64,
    /// Segment directory names, in commit order (not necessarily submission order).
    pub segments: Vec<String>,
    /// Next free chunk id; the base for the next segment to be published.
    pub next_chunk_id: u64,
}

impl ManifestRecord {
    pub fn empty(k1: f64, b: f64) -> Self {
        Self {
            version: MANIFEST_VERSION,
            total_docs: 0,
            total_length: 0,
            k1,
            b,
            segments: Vec::new(),
            next_chunk_id: 0,
        }
    }

    pub fn avgdl(&self) -> f64 {
        if self.total_docs == 0 {
            0.0
        } else {
            self.total_length as f64 / self.total_docs as f64
        }
    }
}

/// Guards manifest reads and publishes for one index directory. A single
/// writer holds the internal lock for the short duration of a publish; this
/// is the engine's one serialization point between concurrent indexing
/// workers.
pub struct Manifest {
    index_dir: PathBuf,
    current: Mutex<ManifestRecord>,
}

impl Manifest {
    /// Opens the manifest at `index_dir`, or creates an empty one in memory
    /// if none exists yet (nothing is written to disk until `publish`).
    pub fn open(index_dir: impl Into<PathBuf>, k1: f64, b: f64) -> Result<Self> {
        let index_dir = index_dir.into();
        let path = index_dir.join(MANIFEST_FILE);

        let current = if path.is_file() {
            read_manifest(&path)?
        } else {
            ManifestRecord::empty(k1, b)
        };

        Ok(Self {
            index_dir,
            current: Mutex::new(current),
        })
    }

    /// Opens an index that must already exist; used by read-only callers
    /// such as `Searcher::open`. Fails with `InvalidManifest` if the
    /// manifest is missing, truncated, or an unsupported version.
    pub fn open_existing(index_dir: impl Into<PathBuf>) -> Result<Self> {
        let index_dir = index_dir.into();
        let path = index_dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(EngineError::InvalidManifest(format!(
                "no manifest at {}",
                path.display()
            )));
        }
        let current = read_manifest(&path)?;
        Ok(Self {
            index_dir,
            current: Mutex::new(current),
        })
    }

    pub fn record(&self) -> ManifestRecord {
        self.current.lock().unwrap().clone()
    }

    /// Appends `segment_name` (with `added_docs`/`added_length` chunks) to the
    /// manifest and atomically publishes the result. Returns the base chunk
    /// id the caller must have used for the new segment, and the published
    /// record.
    pub fn publish_segment(
        &self,
        segment_name: &str,
        added_docs: u64,
        added_length: u64,
    ) -> Result<ManifestRecord> {
        let mut guard = self.current.lock().unwrap();
        let mut next = guard.clone();
        next.segments.push(segment_name.to_string());
        next.total_docs += added_docs;
        next.total_length += added_length;
        next.next_chunk_id += added_docs;

        write_manifest(&self.index_dir, &next)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }
}

fn read_manifest(path: &Path) -> Result<ManifestRecord> {
    let bytes = fs::read(path)
        .map_err(|e| EngineError::InvalidManifest(format!("cannot read manifest: {e}")))?;
    if bytes.is_empty() {
        return Err(EngineError::InvalidManifest("manifest is empty".into()));
    }
    let record: ManifestRecord = serde_json::from_slice(&bytes)
        .map_err(|e| EngineError::InvalidManifest(format!("cannot parse manifest: {e}")))?;
    if record.version != MANIFEST_VERSION {
        return Err(EngineError::InvalidManifest(format!(
            "unsupported manifest version {}",
            record.version
        )));
    }
    Ok(record)
}

fn write_manifest(index_dir: &Path, record: &ManifestRecord) -> Result<()> {
    fs::create_dir_all(index_dir)?;
    let tmp_path = index_dir.join(MANIFEST_TMP_FILE);
    let final_path = index_dir.join(MANIFEST_FILE);

    let bytes = serde_json::to_vec_pretty(record)?;
    {
        let mut f = File::create(&tmp_path)?;
        use std::io::Write;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, &final_path)?;

    if let Ok(dir) = File::open(index_dir) {
        let _ = dir.sync_all();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn opens_empty_manifest_when_absent() {
        let dir = TempDir::new().unwrap();
        let m = Manifest::open(dir.path(), 1.5, 0.75).unwrap();
        let record = m.record();
        assert_eq!(record.total_docs, 0);
        assert_eq!(record.segments.len(), 0);
    }

    #[test]
    fn publish_is_visible_to_a_fresh_open() {
        let dir = TempDir::new().unwrap();
        let m = Manifest::open(dir.path(), 1.5, 0.75).unwrap();
        m.publish_segment("segment_00000", 2, 10).unwrap();

        let reopened = Manifest::open(dir.path(), 1.5, 0.75).unwrap();
        let record = reopened.record();
        assert_eq!(record.total_docs, 2);
        assert_eq!(record.total_length, 10);
        assert_eq!(record.segments, vec!["segment_00000"]);
        assert_eq!(record.avgdl(), 5.0);
    }

    #[test]
    fn publishing_twice_accumulates() {
        let dir = TempDir::new().unwrap();
        let m = Manifest::open(dir.path(), 1.5, 0.75).unwrap();
        m.publish_segment("segment_00000", 2, 10).unwrap();
        m.publish_segment("segment_00001", 3, 12).unwrap();

        let record = m.record();
        assert_eq!(record.total_docs, 5);
        assert_eq!(record.segments, vec!["segment_00000", "segment_00001"]);
        assert_eq!(record.next_chunk_id, 5);
    }

    #[test]
    fn corrupt_manifest_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), b"not json").unwrap();
        assert!(Manifest::open(dir.path(), 1.5, 0.75).is_err());
    }
}
