//! Error types for the search engine

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid postings list: {0}")]
    InvalidPostings(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("write-ahead log corrupt: {0}")]
    WalCorrupt(String),

    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("segment not found: {0}")]
    SegmentNotFound(PathBuf),
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
