//! Write-ahead log for the near-real-time index.
//!
//! Each record is a length-prefixed frame: `[u32 len][bincode bytes][u32
//! crc32]`. `append` fsyncs before returning, so a successful `add_document`
//! survives any crash that follows it.
//!
//! Recovery distinguishes two kinds of damage: a frame truncated by a crash
//! mid-write (fewer bytes on disk than the frame needs) is discarded
//! silently, since it can only be the very last record. A frame that is
//! fully present but whose checksum or encoding doesn't check out is a sign
//! of corruption earlier in the file and is a hard error; silently skipping
//! it could mask data loss in everything that follows.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalRecord {
    pub text: String,
    pub metadata: String,
}

pub struct Wal {
    path: PathBuf,
    file: File,
}

impl Wal {
    /// Opens (creating if absent) the WAL file at `path` for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    /// Appends `record`, fsyncing before returning.
    pub fn append(&mut self, record: &WalRecord) -> Result<()> {
        let bytes = bincode::serialize(record)?;
        let crc = crc32fast::hash(&bytes);

        let mut frame = Vec::with_capacity(8 + bytes.len());
        frame.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        frame.extend_from_slice(&bytes);
        frame.extend_from_slice(&crc.to_le_bytes());

        self.file.write_all(&frame)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Truncates the WAL to empty, e.g. after the in-memory index it backs
    /// has been flushed.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replays every complete, valid record in the WAL at `path`.
///
/// Returns an empty vector if the file does not exist.
pub fn recover(path: &Path) -> Result<Vec<WalRecord>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let mut file = File::open(path)?;
    let mut records = Vec::new();

    loop {
        let len = match read_exact_or_eof(&mut file, 4)? {
            Some(bytes) => u32::from_le_bytes(bytes.try_into().unwrap()) as usize,
            None => break, // clean end of file
        };

        let body = match read_exact_or_eof(&mut file, len)? {
            Some(bytes) => bytes,
            None => {
                log::warn!("wal: truncated trailing record at {}, discarding", path.display());
                break;
            }
        };

        let crc_bytes = match read_exact_or_eof(&mut file, 4)? {
            Some(bytes) => bytes,
            None => {
                log::warn!("wal: truncated trailing checksum at {}, discarding", path.display());
                break;
            }
        };
        let stored_crc = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        let actual_crc = crc32fast::hash(&body);
        if stored_crc != actual_crc {
            return Err(EngineError::WalCorrupt(format!(
                "checksum mismatch in {}",
                path.display()
            )));
        }

        let record: WalRecord = bincode::deserialize(&body).map_err(|e| {
            EngineError::WalCorrupt(format!("malformed record in {}: {e}", path.display()))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Reads exactly `n` bytes, or `None` if the file ends before any bytes are
/// read (clean EOF), or an error distinguishing a short read from any other
/// I/O failure is surfaced to the caller as `Ok(None)` too, since both mean
/// "this frame is not fully on disk".
fn read_exact_or_eof(file: &mut File, n: usize) -> Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; n];
    let mut read_total = 0usize;
    while read_total < n {
        match file.read(&mut buf[read_total..]) {
            Ok(0) => {
                return if read_total == 0 {
                    Ok(None)
                } else {
                    Ok(None) // partial frame: treat as truncated trailing write
                };
            }
            Ok(k) => read_total += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(text: &str) -> WalRecord {
        WalRecord {
            text: text.to_string(),
            metadata: "{}".to_string(),
        }
    }

    #[test]
    fn empty_wal_recovers_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal");
        assert!(recover(&path).unwrap().is_empty());
    }

    #[test]
    fn appended_records_replay_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&record("first")).unwrap();
        wal.append(&record("second")).unwrap();
        drop(wal);

        let records = recover(&path).unwrap();
        assert_eq!(records, vec![record("first"), record("second")]);
    }

    #[test]
    fn truncate_clears_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&record("first")).unwrap();
        wal.truncate().unwrap();
        drop(wal);

        assert!(recover(&path).unwrap().is_empty());
    }

    #[test]
    fn truncated_trailing_record_is_discarded_silently() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&record("first")).unwrap();
        wal.append(&record("second")).unwrap();
        drop(wal);

        // Simulate a crash mid-write: chop off the last few bytes.
        let full = std::fs::read(&path).unwrap();
        std::fs::write(&path, &full[..full.len() - 3]).unwrap();

        let records = recover(&path).unwrap();
        assert_eq!(records, vec![record("first")]);
    }

    #[test]
    fn internally_corrupted_record_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&record("first")).unwrap();
        drop(wal);

        let mut bytes = std::fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF; // flip a bit inside the record body, not the trailing frame
        std::fs::write(&path, &bytes).unwrap();

        let err = recover(&path).unwrap_err();
        assert!(matches!(err, EngineError::WalCorrupt(_)));
    }
}
