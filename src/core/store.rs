use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        history::{OperationLog, DEFAULT_RETENTION},
        ledger::{ApplyRejection, LedgerEntry, QuantityLedger},
    },
    op::{OpKind, OpRecord},
    types::{Count, Delta, ItemKey, TimestampMs},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{key}: {current} {delta:+} would go below zero")]
    WouldGoNegative {
        key: ItemKey,
        current: Count,
        delta: Delta,
    },
    #[error("{key}: {current} {delta:+} is out of range")]
    Overflow {
        key: ItemKey,
        current: Count,
        delta: Delta,
    },
    #[error("quantity must not be zero")]
    ZeroDelta,
    #[error("nothing to undo")]
    NothingToUndo,
}

/// Full durable state: entries, history tail and save time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TallySnapshot {
    pub entries: BTreeMap<ItemKey, LedgerEntry>,
    pub history: Vec<OpRecord>,
    pub updated_at_ms: TimestampMs,
}

/// Outcome of a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub record: OpRecord,
    pub count: Count,
}

#[derive(Debug, Default, Clone)]
pub struct TallyStore {
    ledger: QuantityLedger,
    log: OperationLog,
}

impl TallyStore {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            ledger: QuantityLedger::new(),
            log: OperationLog::with_retention(retention),
        }
    }

    pub fn from_snapshot(snapshot: TallySnapshot, retention: usize) -> Self {
        Self {
            ledger: QuantityLedger::from_entries(snapshot.entries),
            log: OperationLog::from_records(snapshot.history, retention),
        }
    }

    pub fn export_snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            entries: self
                .ledger
                .iter()
                .map(|(k, e)| (k.clone(), *e))
                .collect(),
            history: self.log.iter().cloned().collect(),
            updated_at_ms: now_ms(),
        }
    }

    pub fn apply(&mut self, key: &ItemKey, delta: Delta) -> Result<Committed, StoreError> {
        let applied = self.ledger.apply(key, delta).map_err(|rej| match rej {
            ApplyRejection::WouldGoNegative { current } => StoreError::WouldGoNegative {
                key: key.clone(),
                current,
                delta,
            },
            ApplyRejection::Overflow { current } => StoreError::Overflow {
                key: key.clone(),
                current,
                delta,
            },
            ApplyRejection::ZeroDelta => StoreError::ZeroDelta,
        })?;

        let record = OpRecord::delta(key.clone(), delta, now_ms(), applied.created);
        self.log.push(record.clone());
        Ok(Committed {
            record,
            count: applied.count,
        })
    }

    pub fn mark_empty(&mut self, key: &ItemKey) -> Committed {
        let created = self.ledger.mark_empty(key);
        let record = OpRecord::mark_empty(key.clone(), now_ms(), created);
        self.log.push(record.clone());
        Committed { record, count: 0 }
    }

    /// Pops the newest record and reverses it against the ledger.
    ///
    /// Delta reversal clamps at zero instead of failing. A reversed
    /// mark-empty, or a reversed delta that created the entry, drops the
    /// entry so the item reads as never touched.
    pub fn undo(&mut self) -> Result<Committed, StoreError> {
        let record = self.log.pop().ok_or(StoreError::NothingToUndo)?;
        let count = match record.kind {
            OpKind::Delta => {
                let count = self.ledger.revert_delta(&record.key, record.delta);
                if record.created_entry && count == 0 {
                    self.ledger.remove(&record.key);
                }
                count
            }
            OpKind::MarkEmpty => {
                self.ledger.remove(&record.key);
                0
            }
        };
        Ok(Committed { record, count })
    }

    pub fn reset_all(&mut self) {
        self.ledger.reset_all();
        self.log.clear();
    }

    pub fn current(&self, key: &ItemKey) -> Count {
        self.ledger.current(key)
    }

    pub fn is_reviewed(&self, key: &ItemKey) -> bool {
        self.ledger.is_reviewed(key)
    }

    pub fn ledger(&self) -> &QuantityLedger {
        &self.ledger
    }

    pub fn history(&self) -> &OperationLog {
        &self.log
    }

    pub fn undo_len(&self) -> usize {
        self.log.len()
    }
}

pub(crate) fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
