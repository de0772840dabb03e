use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::types::{Count, Delta, ItemKey};

/// Per-item accumulated count and reviewed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Running count, never negative.
    pub count: Count,
    /// True once any operation has targeted the item.
    pub reviewed: bool,
}

/// Why a delta could not be applied to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyRejection {
    /// `current + delta` would be below zero.
    WouldGoNegative {
        /// Count before the rejected delta.
        current: Count,
    },
    /// `current + delta` does not fit in a [`Count`].
    Overflow {
        /// Count before the rejected delta.
        current: Count,
    },
    /// A zero delta is only valid through mark-empty.
    ZeroDelta,
}

/// Result of a successful [`QuantityLedger::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Count after the delta.
    pub count: Count,
    /// True when the entry did not exist before.
    pub created: bool,
}

/// Exclusive owner of item counts.
#[derive(Debug, Default, Clone)]
pub struct QuantityLedger {
    entries: HashMap<ItemKey, LedgerEntry>,
}

impl QuantityLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from restored entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (ItemKey, LedgerEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Adds `delta` to the item count, rejecting results below zero.
    pub fn apply(&mut self, key: &ItemKey, delta: Delta) -> Result<Applied, ApplyRejection> {
        if delta == 0 {
            return Err(ApplyRejection::ZeroDelta);
        }
        let current = self.current(key);
        let new = match current.checked_add_signed(delta) {
            Some(v) => v,
            None if delta < 0 => return Err(ApplyRejection::WouldGoNegative { current }),
            None => return Err(ApplyRejection::Overflow { current }),
        };

        let created = !self.entries.contains_key(key);
        let entry = self.entries.entry(key.clone()).or_default();
        entry.count = new;
        entry.reviewed = true;
        Ok(Applied { count: new, created })
    }

    /// Force-sets the item count to zero. Returns true when the entry was created.
    pub fn mark_empty(&mut self, key: &ItemKey) -> bool {
        let created = !self.entries.contains_key(key);
        self.entries.insert(
            key.clone(),
            LedgerEntry {
                count: 0,
                reviewed: true,
            },
        );
        created
    }

    /// Reverses a previously applied delta, clamping at zero.
    ///
    /// An absent entry stays absent; an undone mark-empty may already have
    /// dropped it.
    pub fn revert_delta(&mut self, key: &ItemKey, delta: Delta) -> Count {
        let Some(entry) = self.entries.get_mut(key) else {
            return 0;
        };
        entry.count = if delta >= 0 {
            entry.count.saturating_sub(delta.unsigned_abs())
        } else {
            entry.count.saturating_add(delta.unsigned_abs())
        };
        entry.count
    }

    /// Drops the entry so the item reads as never touched.
    pub fn remove(&mut self, key: &ItemKey) -> Option<LedgerEntry> {
        self.entries.remove(key)
    }

    /// Current count, zero for unknown items.
    pub fn current(&self, key: &ItemKey) -> Count {
        self.entries.get(key).map(|e| e.count).unwrap_or(0)
    }

    /// Reviewed flag, false for unknown items.
    pub fn is_reviewed(&self, key: &ItemKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.reviewed)
    }

    /// Entry for `key`, if any.
    pub fn get(&self, key: &ItemKey) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    /// Clears every entry.
    pub fn reset_all(&mut self) {
        self.entries.clear();
    }

    /// Sum of counts across reviewed items.
    pub fn total_count(&self) -> Count {
        self.entries
            .values()
            .filter(|e| e.reviewed)
            .fold(0, |acc: Count, e| acc.saturating_add(e.count))
    }

    /// Number of distinct reviewed items.
    pub fn reviewed_count(&self) -> usize {
        self.entries.values().filter(|e| e.reviewed).count()
    }

    /// Iterates all entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemKey, &LedgerEntry)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the ledger holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
