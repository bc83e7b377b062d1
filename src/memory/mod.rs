//! Per-user semantic memory: record store, similarity index, and the
//! [`MemoryService`](service::MemoryService) facade that keeps them paired.

pub mod index;
pub mod records;
pub mod service;
pub mod types;

use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Errors from the write path and the storage seams.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("record store assigned position {records} but index assigned {index}")]
    PositionMismatch { records: usize, index: usize },

    #[error("store lock poisoned")]
    Poisoned,
}

/// Convert an f32 slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

/// Decode a little-endian f32 blob written by [`embedding_to_bytes`].
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Maximum characters of the user id kept verbatim in a file stem.
const STEM_PREFIX_LEN: usize = 48;

/// Deterministic, filesystem-safe stem for a user's artifacts.
///
/// The id is reduced to `[A-Za-z0-9_-]` and suffixed with a short SHA-256 so
/// that ids differing only in stripped characters never share files.
pub fn user_stem(user_id: &str) -> String {
    let safe: String = user_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(STEM_PREFIX_LEN)
        .collect();
    let digest = Sha256::digest(user_id.as_bytes());
    let hash: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    if safe.is_empty() {
        hash
    } else {
        format!("{safe}-{hash}")
    }
}
