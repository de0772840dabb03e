//! In-memory ledger, operation history and undo engine.

/// Bounded operation history backing undo.
pub mod history;
/// Item counts and reviewed flags.
pub mod ledger;
/// Ledger plus history with snapshot import/export.
#[allow(missing_docs)]
pub mod store;
