//! SQLite-backed single-row snapshot store.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::core::store::{TallySnapshot, now_ms};

use super::{decode_snapshot, encode_snapshot, PersistResult, SnapshotStore};

/// SQLite implementation of [`crate::persist::SnapshotStore`].
///
/// The snapshot is kept as the same JSON text the file store writes, so a
/// payload can be copied out with the `sqlite3` shell for recovery.
pub struct SqliteSnapshotStore {
    conn: Connection,
    label: String,
}

impl SqliteSnapshotStore {
    /// Opens or creates a SQLite-backed store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=FULL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let label = path.as_ref().display().to_string();
        let conn = Connection::open(path)?;
        Self::init_connection(conn, label)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, ":memory:".to_string())
    }

    fn init_connection(conn: Connection, label: String) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Ok(Self { conn, label })
    }

    /// Time of the last save, if any.
    pub fn saved_at_ms(&self) -> PersistResult<Option<u64>> {
        let ts: Option<i64> = self
            .conn
            .query_row("SELECT saved_at_ms FROM snapshot WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(ts.map(|v| v as u64))
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&mut self, snapshot: &TallySnapshot) -> PersistResult<()> {
        let payload = encode_snapshot(snapshot)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO snapshot(id, saved_at_ms, payload) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET saved_at_ms = excluded.saved_at_ms, payload = excluded.payload",
            params![now_ms() as i64, payload],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load(&self) -> PersistResult<Option<TallySnapshot>> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM snapshot WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        decode_snapshot(&payload).map(Some)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.label)
    }
}
