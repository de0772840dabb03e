//! Operation records appended to the undo history.

use serde::{Deserialize, Serialize};

use crate::types::{Delta, ItemKey, TimestampMs};

/// Kind of mutation captured by an [`OpRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// A signed delta was added to the count.
    Delta,
    /// The count was force-set to zero.
    MarkEmpty,
}

/// Immutable record of one committed ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpRecord {
    /// Item the operation targeted.
    pub key: ItemKey,
    /// Applied delta; always zero for [`OpKind::MarkEmpty`].
    pub delta: Delta,
    /// Commit time in milliseconds.
    pub ts_ms: TimestampMs,
    /// Operation kind.
    pub kind: OpKind,
    /// True when this operation created the ledger entry.
    #[serde(default)]
    pub created_entry: bool,
}

impl OpRecord {
    /// Record for a delta application.
    pub fn delta(key: ItemKey, delta: Delta, ts_ms: TimestampMs, created_entry: bool) -> Self {
        Self {
            key,
            delta,
            ts_ms,
            kind: OpKind::Delta,
            created_entry,
        }
    }

    /// Record for a mark-empty operation.
    pub fn mark_empty(key: ItemKey, ts_ms: TimestampMs, created_entry: bool) -> Self {
        Self {
            key,
            delta: 0,
            ts_ms,
            kind: OpKind::MarkEmpty,
            created_entry,
        }
    }
}
