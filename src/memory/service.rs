//! Memory Service: the facade external callers use.
//!
//! Pairs each [`MemoryRecord`] with its [`Fingerprint`] so that the record
//! store and the similarity index always hold the same number of entries in
//! the same order. Writes are serialized per user; reads never fail.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::Rng;

use super::index::{CosineScanIndex, SimilarityIndex, SqliteIndex};
use super::records::{InMemoryRecordStore, JsonRecordStore, RecordStore};
use super::types::{MemoryRecord, SearchResult};
use super::MemoryError;
use crate::embedding::{Fingerprint, Normalizer, EMBEDDING_DIM};

/// Storage strategy, chosen when the service is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Per-user index file plus JSON sidecar, ranked by squared L2.
    Sqlite,
    /// Process memory only, ranked by cosine similarity.
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("unknown storage backend: {s}. Supported: sqlite, memory")),
        }
    }
}

/// Fixed demo videos for [`MemoryService::seed_demo_data`].
const DEMO_VIDEOS: [(&str, &str, &str); 3] = [
    (
        "dQw4w9WgXcQ",
        "Never Gonna Give You Up",
        "A classic music video that became an internet meme. The song is catchy and the video is iconic.",
    ),
    (
        "3JZ_D3ELwOQ",
        "Charlie bit my finger!",
        "A viral video featuring two brothers. Charlie bites his brother's finger, leading to a funny reaction.",
    ),
    (
        "9bZkp7q19f0",
        "PSY - GANGNAM STYLE(강남스타일) M/V",
        "The most-watched YouTube video for years. PSY's dance moves and catchy tune took the world by storm.",
    ),
];

pub struct MemoryService {
    normalizer: Normalizer,
    records: Arc<dyn RecordStore>,
    index: Arc<dyn SimilarityIndex>,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryService {
    pub fn new(
        normalizer: Normalizer,
        records: Arc<dyn RecordStore>,
        index: Arc<dyn SimilarityIndex>,
    ) -> Self {
        Self {
            normalizer,
            records,
            index,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Compose a service for `backend`, storing persisted artifacts under `data_dir`.
    pub fn with_backend(normalizer: Normalizer, backend: Backend, data_dir: &Path) -> Self {
        match backend {
            Backend::Sqlite => Self::new(
                normalizer,
                Arc::new(JsonRecordStore::new(data_dir)),
                Arc::new(SqliteIndex::new(data_dir)),
            ),
            Backend::Memory => Self::new(
                normalizer,
                Arc::new(InMemoryRecordStore::new()),
                Arc::new(CosineScanIndex::new()),
            ),
        }
    }

    pub fn strategy(&self) -> &'static str {
        self.index.strategy()
    }

    fn user_lock(&self, user_id: &str) -> Result<Arc<Mutex<()>>, MemoryError> {
        let mut locks = self.write_locks.lock().map_err(|_| MemoryError::Poisoned)?;
        Ok(Arc::clone(locks.entry(user_id.to_string()).or_default()))
    }

    /// Embed `summary` and store it with its metadata. Returns the new position.
    pub fn add_memory(
        &self,
        user_id: &str,
        title: &str,
        summary: &str,
        source_url: &str,
    ) -> Result<usize, MemoryError> {
        let fingerprint = self.normalizer.embed(summary);
        let record = MemoryRecord::new(title, summary, source_url);
        self.add_paired(user_id, record, &fingerprint)
    }

    /// Add many `(title, summary, url)` triples; stops at the first failure.
    pub fn add_memories<I, S>(&self, user_id: &str, triples: I) -> Result<usize, MemoryError>
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: AsRef<str>,
    {
        self.add_memories_with_progress(user_id, triples, |_| {})
    }

    /// [`add_memories`](Self::add_memories), calling `on_added` with the
    /// running count after each stored memory.
    pub fn add_memories_with_progress<I, S, F>(
        &self,
        user_id: &str,
        triples: I,
        mut on_added: F,
    ) -> Result<usize, MemoryError>
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: AsRef<str>,
        F: FnMut(usize),
    {
        let mut added = 0;
        for (title, summary, url) in triples {
            self.add_memory(user_id, title.as_ref(), summary.as_ref(), url.as_ref())?;
            added += 1;
            on_added(added);
        }
        tracing::info!(user = user_id, count = added, "memories added");
        Ok(added)
    }

    /// Append to both stores as one unit: both get the same position, or
    /// neither keeps the entry.
    fn add_paired(
        &self,
        user_id: &str,
        record: MemoryRecord,
        fingerprint: &Fingerprint,
    ) -> Result<usize, MemoryError> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| MemoryError::Poisoned)?;

        let base = self.reconcile(user_id)?;

        let position = self.records.append(user_id, record)?;
        match self.index.add(user_id, fingerprint) {
            Ok(index_position) if index_position == position => {
                tracing::debug!(user = user_id, position, "memory stored");
                Ok(position)
            }
            Ok(index_position) => {
                self.rollback(user_id, base);
                Err(MemoryError::PositionMismatch {
                    records: position,
                    index: index_position,
                })
            }
            Err(e) => {
                self.rollback(user_id, base);
                Err(e)
            }
        }
    }

    /// Bring both stores to the same length before a write, keeping the
    /// common prefix. Returns that length. A store that cannot be counted
    /// aborts the write; nothing is truncated on a guess.
    fn reconcile(&self, user_id: &str) -> Result<usize, MemoryError> {
        let records = self.records.len(user_id)?;
        let fingerprints = self.index.len(user_id)?;
        if records == fingerprints {
            return Ok(records);
        }

        let keep = records.min(fingerprints);
        tracing::warn!(
            user = user_id,
            records,
            fingerprints,
            keep,
            "record store and index out of sync, truncating to common prefix"
        );
        self.records.truncate(user_id, keep)?;
        self.index.truncate(user_id, keep)?;
        Ok(keep)
    }

    fn rollback(&self, user_id: &str, len: usize) {
        if let Err(e) = self.records.truncate(user_id, len) {
            tracing::warn!(user = user_id, error = %e, "record rollback failed");
        }
        if let Err(e) = self.index.truncate(user_id, len) {
            tracing::warn!(user = user_id, error = %e, "index rollback failed");
        }
    }

    /// Top-`k` memories for `query`, best first. Never fails; problems yield
    /// fewer (or no) results.
    pub fn search_memory(&self, user_id: &str, query: &str, k: usize) -> Vec<SearchResult> {
        if k == 0 {
            return Vec::new();
        }
        let query_fingerprint = self.normalizer.embed(query);
        if query_fingerprint.is_zero() {
            tracing::debug!(user = user_id, "query has no usable fingerprint");
            return Vec::new();
        }

        let neighbors = match self.index.search(user_id, &query_fingerprint, k) {
            Ok(neighbors) => neighbors,
            Err(e) => {
                tracing::warn!(user = user_id, error = %e, "index search failed, returning no results");
                return Vec::new();
            }
        };
        if neighbors.is_empty() {
            return Vec::new();
        }

        let records = self.records.list(user_id);
        let mut results = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            match records.get(neighbor.position) {
                Some(record) => results.push(SearchResult::from_record(
                    record,
                    results.len() + 1,
                    neighbor.position,
                    neighbor.score,
                )),
                None => tracing::warn!(
                    user = user_id,
                    position = neighbor.position,
                    "index position has no record, skipping"
                ),
            }
        }
        results
    }

    /// Remove everything stored for `user_id`. Idempotent.
    pub fn clear_memory(&self, user_id: &str) -> Result<(), MemoryError> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| MemoryError::Poisoned)?;

        self.index.clear(user_id)?;
        self.records.clear(user_id)?;
        tracing::info!(user = user_id, "memory cleared");

        self.forget_lock(user_id, &lock)?;
        Ok(())
    }

    /// Drop the user's lock entry unless another writer already holds a
    /// handle to it.
    fn forget_lock(&self, user_id: &str, lock: &Arc<Mutex<()>>) -> Result<(), MemoryError> {
        let mut locks = self.write_locks.lock().map_err(|_| MemoryError::Poisoned)?;
        // One reference in the map, one held by the caller.
        if Arc::strong_count(lock) == 2 {
            locks.remove(user_id);
        }
        Ok(())
    }

    /// Add the fixed demo videos with random fingerprints. Demonstration only:
    /// these fingerprints do not come from the normalizer.
    pub fn seed_demo_data(&self, user_id: &str) -> Result<usize, MemoryError> {
        let mut rng = rand::rng();
        for (video_id, title, summary) in DEMO_VIDEOS {
            let raw: Vec<f32> = (0..EMBEDDING_DIM).map(|_| rng.random::<f32>()).collect();
            let record = MemoryRecord::new(
                title,
                summary,
                format!("https://www.youtube.com/watch?v={video_id}"),
            );
            self.add_paired(user_id, record, &Fingerprint::from_raw(&raw))?;
        }
        tracing::info!(user = user_id, count = DEMO_VIDEOS.len(), "demo data seeded");
        Ok(DEMO_VIDEOS.len())
    }

    /// Ordered snapshot of a user's records.
    pub fn list_memories(&self, user_id: &str) -> Vec<MemoryRecord> {
        self.records.list(user_id)
    }

    /// Number of records for `user_id`; zero if the store cannot be read.
    pub fn memory_count(&self, user_id: &str) -> usize {
        self.records.len(user_id).unwrap_or_else(|e| {
            tracing::warn!(user = user_id, error = %e, "record count unavailable");
            0
        })
    }

    /// Number of fingerprints held by the index for `user_id`; zero if the
    /// index cannot be read.
    pub fn fingerprint_count(&self, user_id: &str) -> usize {
        self.index.len(user_id).unwrap_or_else(|e| {
            tracing::warn!(user = user_id, error = %e, "fingerprint count unavailable");
            0
        })
    }

    /// Fingerprint stored at `position`, if any.
    pub fn fingerprint_at(&self, user_id: &str, position: usize) -> Option<Fingerprint> {
        self.index.fingerprint(user_id, position).ok().flatten()
    }
}
