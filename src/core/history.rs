use std::collections::VecDeque;

use crate::op::OpRecord;

/// Default number of records kept for undo and persistence.
pub const DEFAULT_RETENTION: usize = 2000;

/// Bounded, append-only operation history.
///
/// Appending past the retention evicts the oldest record. [`Self::pop`] is the
/// only other removal and always takes the newest record.
#[derive(Debug, Clone)]
pub struct OperationLog {
    records: VecDeque<OpRecord>,
    retention: usize,
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl OperationLog {
    /// Creates an empty log keeping at most `retention` records (minimum 1).
    pub fn with_retention(retention: usize) -> Self {
        Self {
            records: VecDeque::new(),
            retention: retention.max(1),
        }
    }

    /// Builds a log from restored records, keeping only the newest tail.
    pub fn from_records(records: impl IntoIterator<Item = OpRecord>, retention: usize) -> Self {
        let mut log = Self::with_retention(retention);
        for rec in records {
            log.push(rec);
        }
        log
    }

    /// Appends a record.
    pub fn push(&mut self, record: OpRecord) {
        if self.records.len() == self.retention {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Removes and returns the most recent record.
    pub fn pop(&mut self) -> Option<OpRecord> {
        self.records.pop_back()
    }

    /// Most recent record without removing it.
    pub fn last(&self) -> Option<&OpRecord> {
        self.records.back()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &OpRecord> {
        self.records.iter()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum retained records.
    pub fn retention(&self) -> usize {
        self.retention
    }
}
