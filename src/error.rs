//! Error types for snapshot encoding and decoding.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Snapshot is not a canvas map")]
    NotACanvas,

    #[error("Unsupported snapshot version {found} (newest known is {supported})")]
    UnsupportedVersion { found: i64, supported: i64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Serialization(e.to_string())
    }
}
