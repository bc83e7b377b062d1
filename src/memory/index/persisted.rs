use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Neighbor, SimilarityIndex};
use crate::db;
use crate::embedding::Fingerprint;
use crate::memory::{bytes_to_embedding, embedding_to_bytes, user_stem, MemoryError};

/// Persisted exact-distance index: one SQLite file per user, `index_<stem>.db`.
///
/// Connections are opened per call; nothing is cached between operations, so a
/// cleared user leaves no handle behind. Reads open the file read-only and
/// never create it; the file runs in WAL mode so they never block the writer.
pub struct SqliteIndex {
    dir: PathBuf,
}

impl SqliteIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Index file path for a user.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("index_{}.db", user_stem(user_id)))
    }

    /// Open an existing index for reading; `None` if the user has none.
    fn open_existing(&self, user_id: &str) -> Result<Option<Connection>, MemoryError> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Ok(None);
        }
        db::open_index_readonly(&path).map(Some)
    }

    /// Open for writing, recreating the file only if it is damaged. Busy or
    /// locked files are reported, never removed.
    fn open_for_write(&self, user_id: &str) -> Result<Connection, MemoryError> {
        let path = self.path_for(user_id);
        match db::open_index_database(&path) {
            Err(MemoryError::Corrupt { reason, .. }) => {
                tracing::warn!(path = %path.display(), %reason, "recreating corrupt index");
                remove_artifact(&path)?;
                db::open_index_database(&path)
            }
            other => other,
        }
    }
}

/// Delete the index file and any SQLite side files next to it.
fn remove_artifact(path: &Path) -> Result<(), MemoryError> {
    let side_files: Vec<PathBuf> = ["-wal", "-shm", "-journal"]
        .iter()
        .map(|suffix| PathBuf::from(format!("{}{suffix}", path.display())))
        .collect();
    for p in std::iter::once(path).chain(side_files.iter().map(PathBuf::as_path)) {
        match fs::remove_file(p) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn count(conn: &Connection) -> rusqlite::Result<usize> {
    conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as usize)
}

impl SimilarityIndex for SqliteIndex {
    fn add(&self, user_id: &str, fingerprint: &Fingerprint) -> Result<usize, MemoryError> {
        let mut conn = self.open_for_write(user_id)?;
        // Take the write lock up front; a deferred read-then-write upgrade
        // fails immediately instead of waiting when another connection reads.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let position = count(&tx)?;
        tx.execute(
            "INSERT INTO fingerprints (position, embedding) VALUES (?1, ?2)",
            params![position as i64, embedding_to_bytes(fingerprint.as_slice())],
        )?;

        tx.commit()?;
        tracing::debug!(user = user_id, position, "fingerprint stored");
        Ok(position)
    }

    fn search(
        &self,
        user_id: &str,
        query: &Fingerprint,
        k: usize,
    ) -> Result<Vec<Neighbor>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(conn) = self.open_existing(user_id)? else {
            return Ok(Vec::new());
        };

        // Exact brute-force scan; rank key is squared L2.
        let mut stmt = conn.prepare(
            "SELECT position, vec_distance_l2(embedding, ?1) AS distance FROM fingerprints \
             ORDER BY distance ASC, position ASC LIMIT ?2",
        )?;
        let neighbors = stmt
            .query_map(
                params![embedding_to_bytes(query.as_slice()), k as i64],
                |row| {
                    let distance: f64 = row.get(1)?;
                    Ok(Neighbor {
                        position: row.get::<_, i64>(0)? as usize,
                        score: (distance * distance) as f32,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(neighbors)
    }

    fn len(&self, user_id: &str) -> Result<usize, MemoryError> {
        match self.open_existing(user_id) {
            Ok(Some(conn)) => Ok(count(&conn)?),
            Ok(None) => Ok(0),
            Err(MemoryError::Corrupt { reason, .. }) => {
                tracing::warn!(user = user_id, %reason, "corrupt index, counting as empty");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn fingerprint(
        &self,
        user_id: &str,
        position: usize,
    ) -> Result<Option<Fingerprint>, MemoryError> {
        let Some(conn) = self.open_existing(user_id)? else {
            return Ok(None);
        };
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM fingerprints WHERE position = ?1",
                params![position as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.and_then(|b| Fingerprint::from_stored(bytes_to_embedding(&b))))
    }

    fn truncate(&self, user_id: &str, len: usize) -> Result<(), MemoryError> {
        if !self.path_for(user_id).exists() {
            return Ok(());
        }
        let conn = self.open_for_write(user_id)?;
        conn.execute(
            "DELETE FROM fingerprints WHERE position >= ?1",
            params![len as i64],
        )?;
        Ok(())
    }

    fn clear(&self, user_id: &str) -> Result<(), MemoryError> {
        let path = self.path_for(user_id);
        remove_artifact(&path)?;
        tracing::debug!(path = %path.display(), "index file deleted");
        Ok(())
    }

    fn strategy(&self) -> &'static str {
        "sqlite-l2"
    }
}
