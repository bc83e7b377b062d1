//! SQL DDL for a per-user fingerprint index.
//!
//! Each user's index file holds `fingerprints` (one row per stored memory,
//! keyed by its 0-based position) and `index_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::{params, Connection, OptionalExtension};

use crate::embedding::EMBEDDING_DIM;

/// The schema version that the current binary writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
-- Fingerprints, raw little-endian f32 blobs readable by sqlite-vec
CREATE TABLE IF NOT EXISTS fingerprints (
    position INTEGER PRIMARY KEY CHECK(position >= 0),
    embedding BLOB NOT NULL
);

-- Index metadata
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO index_meta (key, value) VALUES ('schema_version', ?1)",
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO index_meta (key, value) VALUES ('dimensions', ?1)",
        params![EMBEDDING_DIM.to_string()],
    )?;

    Ok(())
}

/// Whether both index tables exist. Read-only.
pub fn has_schema(conn: &Connection) -> rusqlite::Result<bool> {
    let tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master \
         WHERE type = 'table' AND name IN ('fingerprints', 'index_meta')",
        [],
        |row| row.get(0),
    )?;
    Ok(tables == 2)
}

/// Read a value from `index_meta`.
pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM index_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

/// Stored fingerprint dimensionality, if recorded.
pub fn get_dimensions(conn: &Connection) -> rusqlite::Result<Option<usize>> {
    Ok(get_meta(conn, "dimensions")?.and_then(|v| v.parse().ok()))
}
