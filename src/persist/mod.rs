pub mod json_file;
pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::{
    core::{ledger::LedgerEntry, store::TallySnapshot},
    op::OpRecord,
    types::{Count, ItemKey, TimestampMs},
};

/// Version written into every snapshot payload.
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("snapshot decode: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u16),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable home of the full tally snapshot.
pub trait SnapshotStore: Send {
    /// Replaces the stored snapshot. A later `load` sees either the old or
    /// the new snapshot, never a mix.
    fn save(&mut self, snapshot: &TallySnapshot) -> PersistResult<()>;

    /// Reads the stored snapshot; `Ok(None)` when nothing was saved yet.
    fn load(&self) -> PersistResult<Option<TallySnapshot>>;

    /// Human-readable location for logs and status lines.
    fn describe(&self) -> String;
}

/// In-process store holding the encoded snapshot text.
///
/// Clones share the same slot, so a test can keep one clone to inspect or
/// reload what a session wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the slot with raw payload text, e.g. a legacy or corrupt file.
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(payload.into()))),
        }
    }

    /// Raw payload currently stored.
    pub fn payload(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&mut self, snapshot: &TallySnapshot) -> PersistResult<()> {
        let payload = encode_snapshot(snapshot)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| PersistError::Message("memory store lock poisoned".to_string()))?;
        *slot = Some(payload);
        Ok(())
    }

    fn load(&self) -> PersistResult<Option<TallySnapshot>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| PersistError::Message("memory store lock poisoned".to_string()))?;
        slot.as_deref().map(decode_snapshot).transpose()
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[derive(Serialize)]
struct SnapshotEnvelope<'a> {
    format_version: u16,
    #[serde(flatten)]
    snapshot: &'a TallySnapshot,
}

#[derive(Deserialize)]
struct StoredSnapshot {
    #[serde(default = "legacy_format_version")]
    format_version: u16,
    #[serde(default)]
    entries: BTreeMap<ItemKey, StoredEntry>,
    #[serde(default)]
    history: Vec<OpRecord>,
    #[serde(default)]
    updated_at_ms: TimestampMs,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Full {
        count: Count,
        #[serde(default)]
        reviewed: Option<bool>,
    },
    // Older files stored a bare count per key.
    Count(Count),
}

fn legacy_format_version() -> u16 {
    1
}

/// Renders a snapshot as pretty, key-ordered JSON.
pub fn encode_snapshot(snapshot: &TallySnapshot) -> PersistResult<String> {
    let env = SnapshotEnvelope {
        format_version: SNAPSHOT_FORMAT_VERSION,
        snapshot,
    };
    Ok(serde_json::to_string_pretty(&env)?)
}

/// Parses snapshot text, upgrading legacy layouts.
///
/// Entries without a `reviewed` flag load as reviewed: a stored count means
/// the item was counted.
pub fn decode_snapshot(payload: &str) -> PersistResult<TallySnapshot> {
    let stored: StoredSnapshot = serde_json::from_str(payload)?;
    if stored.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(stored.format_version));
    }

    let entries = stored
        .entries
        .into_iter()
        .map(|(key, entry)| {
            let entry = match entry {
                StoredEntry::Full { count, reviewed } => LedgerEntry {
                    count,
                    reviewed: reviewed.unwrap_or(true),
                },
                StoredEntry::Count(count) => LedgerEntry {
                    count,
                    reviewed: true,
                },
            };
            (key, entry)
        })
        .collect();

    Ok(TallySnapshot {
        entries,
        history: stored.history,
        updated_at_ms: stored.updated_at_ms,
    })
}
