//! Notifications emitted after each command.

use crate::types::{Count, ItemKey};

/// Events emitted from the session runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyEvent {
    /// The operator selected an item.
    Selected {
        /// Selected item.
        key: ItemKey,
    },
    /// A delta was applied.
    Counted {
        /// Affected item.
        key: ItemKey,
        /// Count afterwards.
        count: Count,
    },
    /// An item was set to zero.
    MarkedEmpty {
        /// Affected item.
        key: ItemKey,
    },
    /// The newest operation was reversed.
    Undone {
        /// Affected item.
        key: ItemKey,
        /// Count afterwards.
        count: Count,
    },
    /// Every count was cleared.
    Reset,
    /// A change was applied but could not be saved.
    NotDurable {
        /// Write failure description.
        message: String,
    },
}
