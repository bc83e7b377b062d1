//! Similarity Index: per-user position → fingerprint storage with exact k-NN.
//!
//! Two interchangeable strategies:
//!
//! - [`SqliteIndex`]: persisted per-user index file, ranked by squared L2
//!   distance (lower is better) via sqlite-vec.
//! - [`CosineScanIndex`]: in-process scan ranked by cosine similarity
//!   (higher is better).
//!
//! Both return at most `k` neighbors best-first, break ties by position, and
//! treat `k == 0` as an empty request.

mod persisted;
mod scan;

pub use persisted::SqliteIndex;
pub use scan::CosineScanIndex;

use serde::Serialize;

use super::MemoryError;
use crate::embedding::Fingerprint;

/// One ranked hit from an index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub position: usize,
    pub score: f32,
}

pub trait SimilarityIndex: Send + Sync {
    /// Append a fingerprint for `user_id` and return its position.
    fn add(&self, user_id: &str, fingerprint: &Fingerprint) -> Result<usize, MemoryError>;

    /// Up to `k` nearest neighbors of `query`, best first.
    fn search(
        &self,
        user_id: &str,
        query: &Fingerprint,
        k: usize,
    ) -> Result<Vec<Neighbor>, MemoryError>;

    /// Number of stored fingerprints. A corrupt artifact counts as zero;
    /// any other failure is an error, so callers never mistake a busy store
    /// for an empty one.
    fn len(&self, user_id: &str) -> Result<usize, MemoryError>;

    /// The fingerprint stored at `position`, if any.
    fn fingerprint(&self, user_id: &str, position: usize)
        -> Result<Option<Fingerprint>, MemoryError>;

    /// Drop every fingerprint at position `len` and beyond.
    fn truncate(&self, user_id: &str, len: usize) -> Result<(), MemoryError>;

    /// Discard all fingerprints and any persisted artifact. Idempotent.
    fn clear(&self, user_id: &str) -> Result<(), MemoryError>;

    /// Short label for logs and stats.
    fn strategy(&self) -> &'static str;
}
