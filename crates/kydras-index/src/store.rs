//! [`ReplicaIndex`] — SQLite-backed replica expectation store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kydras_types::{PoolId, ReplicaRecord};
use rusqlite::{Connection, OpenFlags, params};
use tracing::debug;

use crate::error::IndexError;

type Result<T> = std::result::Result<T, IndexError>;

/// Subdirectory of the per-user application-data directory.
const SIDECAR_DIR: &str = "KydrasStorage";
/// Sidecar database file name.
const SIDECAR_FILE: &str = "kydras.db";

/// Replica index over a SQLite sidecar database.
///
/// Every operation opens its own short-lived connection in
/// read-write-create mode with shared cache; concurrent access is
/// serialized by SQLite's own locking. All writes are single-row
/// upserts or deletes.
pub struct ReplicaIndex {
    db_path: PathBuf,
}

impl ReplicaIndex {
    /// Open the index at its default location:
    /// `<per-user data dir>/KydrasStorage/kydras.db`.
    ///
    /// The parent directory is created on first use.
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::open_at(base.join(SIDECAR_DIR).join(SIDECAR_FILE))
    }

    /// Open the index at an explicit database path.
    ///
    /// Used by tests and by shells that relocate the sidecar.
    pub fn open_at(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let index = Self { db_path };
        // Fail fast on an unusable path and leave the schema behind.
        index.connect()?;
        Ok(index)
    }

    /// Path of the sidecar database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a short-lived connection and ensure the schema exists.
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_SHARED_CACHE,
        )?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS replicas (
                 pool_id      TEXT NOT NULL,
                 rel_path     TEXT NOT NULL,
                 drive_root   TEXT NOT NULL,
                 size_bytes   INTEGER NOT NULL,
                 sha256       TEXT NOT NULL,
                 modified_utc TEXT NOT NULL,
                 PRIMARY KEY (pool_id, rel_path, drive_root)
             );
             CREATE INDEX IF NOT EXISTS idx_replicas_pool_path
                 ON replicas (pool_id, rel_path);",
        )?;
        Ok(conn)
    }

    /// Insert or update the row for `(pool_id, rel_path, drive_root)`.
    pub fn upsert(&self, record: &ReplicaRecord) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO replicas
                 (pool_id, rel_path, drive_root, size_bytes, sha256, modified_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (pool_id, rel_path, drive_root) DO UPDATE SET
                 size_bytes   = excluded.size_bytes,
                 sha256       = excluded.sha256,
                 modified_utc = excluded.modified_utc",
            params![
                record.pool_id.to_string(),
                record.rel_path,
                record.drive_root,
                record.size_bytes as i64,
                record.sha256,
                record.modified_utc.to_rfc3339(),
            ],
        )?;
        debug!(
            pool_id = %record.pool_id,
            rel_path = %record.rel_path,
            drive_root = %record.drive_root,
            "upserted replica row"
        );
        Ok(())
    }

    /// Remove the row for one replica. Removing an absent row is not an error.
    pub fn remove(&self, pool_id: PoolId, rel_path: &str, drive_root: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM replicas
             WHERE pool_id = ?1 AND rel_path = ?2 AND drive_root = ?3",
            params![pool_id.to_string(), rel_path, drive_root],
        )?;
        Ok(())
    }

    /// Remove every row for a relative path. Returns how many were removed.
    pub fn remove_all(&self, pool_id: PoolId, rel_path: &str) -> Result<usize> {
        let conn = self.connect()?;
        let n = conn.execute(
            "DELETE FROM replicas WHERE pool_id = ?1 AND rel_path = ?2",
            params![pool_id.to_string(), rel_path],
        )?;
        Ok(n)
    }

    /// All recorded replicas for a relative path, in insertion-stable
    /// `drive_root` order.
    pub fn get_all(&self, pool_id: PoolId, rel_path: &str) -> Result<Vec<ReplicaRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT pool_id, rel_path, drive_root, size_bytes, sha256, modified_utc
             FROM replicas
             WHERE pool_id = ?1 AND rel_path = ?2
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![pool_id.to_string(), rel_path], row_to_record)?;
        collect_records(rows)
    }

    /// Every recorded replica for a pool. Used by diagnostics and tests.
    pub fn records_for_pool(&self, pool_id: PoolId) -> Result<Vec<ReplicaRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT pool_id, rel_path, drive_root, size_bytes, sha256, modified_utc
             FROM replicas
             WHERE pool_id = ?1
             ORDER BY rel_path, rowid",
        )?;
        let rows = stmt.query_map(params![pool_id.to_string()], row_to_record)?;
        collect_records(rows)
    }
}

/// Decode one SQL row into the raw column tuple.
fn row_to_record(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(String, String, String, i64, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

/// Convert raw column tuples into typed records, surfacing undecodable
/// rows as [`IndexError::CorruptRow`].
fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<(String, String, String, i64, String, String)>>,
) -> Result<Vec<ReplicaRecord>> {
    let mut records = Vec::new();
    for row in rows {
        let (pool_id, rel_path, drive_root, size_bytes, sha256, modified_utc) = row?;
        let pool_id: PoolId = pool_id
            .parse()
            .map_err(|_| IndexError::CorruptRow(format!("bad pool id: {pool_id}")))?;
        let modified_utc: DateTime<Utc> = modified_utc
            .parse()
            .map_err(|_| IndexError::CorruptRow(format!("bad timestamp: {modified_utc}")))?;
        records.push(ReplicaRecord {
            pool_id,
            rel_path,
            drive_root,
            size_bytes: size_bytes.max(0) as u64,
            sha256,
            modified_utc,
        });
    }
    Ok(records)
}
