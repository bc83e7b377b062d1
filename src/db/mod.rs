//! SQLite plumbing for the persisted fingerprint index.

pub mod schema;

use rusqlite::{Connection, ErrorCode, OpenFlags};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use crate::embedding::EMBEDDING_DIM;
use crate::memory::MemoryError;

static SQLITE_VEC_INIT: Once = Once::new();

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// True when SQLite says the file itself is damaged, as opposed to busy,
/// locked, or otherwise failing for the moment.
pub fn is_corruption(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

/// Map a SQLite error on `path`: damage becomes [`MemoryError::Corrupt`],
/// everything else stays [`MemoryError::Sqlite`].
fn classify(path: &Path, err: rusqlite::Error) -> MemoryError {
    if is_corruption(&err) {
        MemoryError::Corrupt {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    } else {
        MemoryError::Sqlite(err)
    }
}

/// Open (or create) a fingerprint index file for writing, with sqlite-vec
/// loaded, WAL enabled, and the schema initialized.
///
/// Fails with [`MemoryError::Corrupt`] only if the file is damaged or holds
/// fingerprints of another dimension. Busy and locked errors are returned as
/// [`MemoryError::Sqlite`].
pub fn open_index_database(path: impl AsRef<Path>) -> Result<Connection, MemoryError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path).map_err(|e| classify(path, e))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // WAL so searches never block the writer
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| classify(path, e))?;
    schema::init_schema(&conn).map_err(|e| classify(path, e))?;
    check_dimensions(&conn, path)?;

    tracing::debug!(path = %path.display(), "index database opened");
    Ok(conn)
}

/// Open an existing index file read-only. Never writes, so it never competes
/// with a writer for the write lock.
///
/// A file without the index tables is reported as [`MemoryError::Corrupt`].
pub fn open_index_readonly(path: impl AsRef<Path>) -> Result<Connection, MemoryError> {
    let path = path.as_ref();

    load_sqlite_vec();

    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags).map_err(|e| classify(path, e))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    if !schema::has_schema(&conn).map_err(|e| classify(path, e))? {
        return Err(MemoryError::Corrupt {
            path: path.to_path_buf(),
            reason: "index tables missing".to_string(),
        });
    }
    check_dimensions(&conn, path)?;
    Ok(conn)
}

fn check_dimensions(conn: &Connection, path: &Path) -> Result<(), MemoryError> {
    match schema::get_dimensions(conn).map_err(|e| classify(path, e))? {
        Some(EMBEDDING_DIM) => Ok(()),
        other => Err(MemoryError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("index dimensions {other:?}, expected {EMBEDDING_DIM}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_enables_wal() {
        let tmp = TempDir::new().unwrap();
        let conn = open_index_database(tmp.path().join("index.db")).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.db");
        std::fs::write(&path, b"definitely not sqlite, just some bytes in a file").unwrap();

        assert!(matches!(open_index_database(&path), Err(MemoryError::Corrupt { .. })));
        assert!(matches!(open_index_readonly(&path), Err(MemoryError::Corrupt { .. })));
    }

    #[test]
    fn test_readonly_rejects_missing_tables() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();

        assert!(matches!(open_index_readonly(&path), Err(MemoryError::Corrupt { .. })));
    }

    #[test]
    fn test_busy_is_not_corruption() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.db");
        open_index_database(&path).unwrap();

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.busy_timeout(Duration::from_millis(50)).unwrap();
        let err = conn
            .execute("INSERT INTO index_meta (key, value) VALUES ('k', 'v')", [])
            .unwrap_err();
        assert!(!is_corruption(&err));
        assert!(matches!(classify(&path, err), MemoryError::Sqlite(_)));
    }
}
