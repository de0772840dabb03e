//! Operator command handling over the ledger, packs and persistence.
//!
//! Each command validates its input, commits against the [`TallyStore`],
//! then writes the full snapshot through the configured [`SnapshotStore`]
//! before reporting success. Rejected commands leave the ledger, history and
//! stored snapshot untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Catalog, CatalogItem},
    config::SessionConfig,
    core::{
        ledger::LedgerEntry,
        store::{Committed, StoreError, TallyStore},
    },
    op::{OpKind, OpRecord},
    packs::{self, PackId, Packs},
    persist::{PersistError, PersistResult, SnapshotStore},
    report::{self, ReportRow},
    types::{Count, Delta, ItemKey},
};

/// Input rejected before touching the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No item is selected.
    #[error("select an item first")]
    NoSelection,
    /// The key is not part of the catalog.
    #[error("item not in catalog: {0}")]
    UnknownItem(ItemKey),
    /// Free-text quantity was empty, malformed or not positive.
    #[error("enter a positive quantity (got {0:?})")]
    InvalidQuantity(String),
    /// A zero delta was requested.
    #[error("quantity must not be zero")]
    ZeroQuantity,
    /// The brand has no size for this pack.
    #[error("{} is not available for brand {brand:?}", .pack.label())]
    PackUnavailable {
        /// Requested pack.
        pack: PackId,
        /// Brand of the selected item.
        brand: String,
    },
}

/// Failure of a session command.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Input was rejected; nothing changed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The ledger refused the change or there was nothing to undo.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The change is applied in memory but the snapshot write failed.
    #[error("{status}, but it was not saved: {source}")]
    NotDurable {
        /// Status of the applied change.
        status: String,
        /// Write failure.
        source: PersistError,
    },
}

impl SessionError {
    /// True when the in-memory state changed despite the error.
    pub fn mutated(&self) -> bool {
        matches!(self, SessionError::NotDurable { .. })
    }
}

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Operator-facing message.
    pub status: String,
    /// Record appended or reversed, if the command touched the ledger.
    pub record: Option<OpRecord>,
    /// Count of the affected item afterwards.
    pub count: Count,
}

/// Derived totals across reviewed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of reviewed counts.
    pub total_count: Count,
    /// Number of reviewed items.
    pub reviewed_count: usize,
}

/// One quick-increment button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickAmount {
    /// Pack the button applies.
    pub pack: PackId,
    /// Units added, `None` when disabled.
    pub magnitude: Option<Count>,
    /// Display label.
    pub label: String,
}

/// Quick-increment options for the selected item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickAmounts {
    /// Brand the sizes were resolved for.
    pub brand: String,
    /// Resolver result.
    pub packs: Packs,
    /// Buttons in display order.
    pub amounts: Vec<QuickAmount>,
}

/// Single-operator tally session.
pub struct Session {
    store: TallyStore,
    catalog: Arc<Catalog>,
    sink: Box<dyn SnapshotStore>,
    selected: Option<ItemKey>,
    status: String,
    startup_warning: Option<String>,
}

impl Session {
    /// Opens the configured backend and restores the last snapshot.
    ///
    /// An unreadable JSON snapshot degrades to an empty ledger with a
    /// [`Self::startup_warning`], since the file store can still write over
    /// it. A SQLite file that is not a database fails here with
    /// [`PersistError::Sqlite`]: there is no usable store to write through,
    /// and the file is left for the operator to inspect.
    pub fn open(config: &SessionConfig, catalog: Arc<Catalog>) -> PersistResult<Self> {
        let sink = config.open_store()?;
        Ok(Self::with_store(catalog, sink, config.history_retention))
    }

    /// Restores from `sink`. An unreadable snapshot starts an empty ledger
    /// and is reported through [`Self::startup_warning`].
    pub fn with_store(
        catalog: Arc<Catalog>,
        sink: Box<dyn SnapshotStore>,
        history_retention: usize,
    ) -> Self {
        let (store, startup_warning) = match sink.load() {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    location = %sink.describe(),
                    entries = snapshot.entries.len(),
                    history = snapshot.history.len(),
                    "restored tally snapshot"
                );
                (TallyStore::from_snapshot(snapshot, history_retention), None)
            }
            Ok(None) => {
                tracing::info!(location = %sink.describe(), "no saved tally, starting empty");
                (TallyStore::with_retention(history_retention), None)
            }
            Err(err) => {
                tracing::warn!(location = %sink.describe(), "saved tally unreadable, starting empty: {err}");
                (
                    TallyStore::with_retention(history_retention),
                    Some(format!("saved tally could not be read: {err}")),
                )
            }
        };

        let status = match &startup_warning {
            Some(warning) => warning.clone(),
            None => format!("Catalog loaded: {} items", catalog.len()),
        };

        Self {
            store,
            catalog,
            sink,
            selected: None,
            status,
            startup_warning,
        }
    }

    /// Selects a catalog item as the target of later commands.
    pub fn select(&mut self, key: &ItemKey) -> Result<CommandOutcome, SessionError> {
        let res = match self.catalog.get(key) {
            Some(_) => {
                self.selected = Some(key.clone());
                let count = self.store.current(key);
                Ok(CommandOutcome {
                    status: format!("Selected: {key} ({})", format_count(count)),
                    record: None,
                    count,
                })
            }
            None => Err(ValidationError::UnknownItem(key.clone()).into()),
        };
        self.finish(res)
    }

    /// Adds a signed delta to the selected item.
    pub fn apply_delta(&mut self, delta: Delta) -> Result<CommandOutcome, SessionError> {
        let res = self.try_apply_delta(delta);
        self.finish(res)
    }

    /// Adds one unit.
    pub fn increment(&mut self) -> Result<CommandOutcome, SessionError> {
        self.apply_delta(1)
    }

    /// Removes one unit.
    pub fn decrement(&mut self) -> Result<CommandOutcome, SessionError> {
        self.apply_delta(-1)
    }

    /// Adds the selected brand's size for `pack`.
    pub fn apply_named_pack(&mut self, pack: PackId) -> Result<CommandOutcome, SessionError> {
        let res = self.pack_delta(pack).and_then(|delta| self.try_apply_delta(delta));
        self.finish(res)
    }

    /// Adds a free-text quantity such as `"2,700"`.
    pub fn add_text(&mut self, text: &str) -> Result<CommandOutcome, SessionError> {
        let res = text_delta(text).and_then(|delta| self.try_apply_delta(delta));
        self.finish(res)
    }

    /// Subtracts a free-text quantity.
    pub fn subtract_text(&mut self, text: &str) -> Result<CommandOutcome, SessionError> {
        let res = text_delta(text).and_then(|delta| self.try_apply_delta(-delta));
        self.finish(res)
    }

    /// Sets the selected item's count to zero.
    pub fn mark_empty(&mut self) -> Result<CommandOutcome, SessionError> {
        let res = match self.selected_key() {
            Ok(key) => {
                let committed = self.store.mark_empty(&key);
                self.persist(format!("{key}: marked empty"), committed)
            }
            Err(err) => Err(err.into()),
        };
        self.finish(res)
    }

    /// Reverses the most recent operation.
    pub fn undo(&mut self) -> Result<CommandOutcome, SessionError> {
        let res = match self.store.undo() {
            Ok(committed) => {
                let status = match committed.record.kind {
                    OpKind::Delta => format!(
                        "Undid {:+} on {} (now {})",
                        committed.record.delta,
                        committed.record.key,
                        format_count(committed.count)
                    ),
                    OpKind::MarkEmpty => format!("Undid mark empty on {}", committed.record.key),
                };
                self.persist(status, committed)
            }
            Err(err) => Err(err.into()),
        };
        self.finish(res)
    }

    /// Clears every count and the undo history.
    pub fn reset_all(&mut self) -> Result<CommandOutcome, SessionError> {
        self.store.reset_all();
        tracing::info!("tally reset");
        let snapshot = self.store.export_snapshot();
        let status = "All counts cleared".to_string();
        let res = match self.sink.save(&snapshot) {
            Ok(()) => Ok(CommandOutcome {
                status,
                record: None,
                count: 0,
            }),
            Err(source) => {
                tracing::error!(location = %self.sink.describe(), "failed to save tally after reset: {source}");
                Err(SessionError::NotDurable { status, source })
            }
        };
        self.finish(res)
    }

    /// Pack buttons for the selected item's brand.
    pub fn quick_amounts(&self) -> Result<QuickAmounts, ValidationError> {
        let key = self.selected_key()?;
        let brand = self.brand_of(&key);
        let packs = packs::resolve(&brand);
        let amounts = PackId::ALL
            .iter()
            .map(|&pack| {
                let magnitude = packs.magnitude(pack);
                let label = match magnitude {
                    Some(n) => format!("{} +{}", pack.label(), format_count(n)),
                    None => format!("{} (n/a)", pack.label()),
                };
                QuickAmount {
                    pack,
                    magnitude,
                    label,
                }
            })
            .collect();
        Ok(QuickAmounts {
            brand,
            packs,
            amounts,
        })
    }

    /// Totals recomputed from the ledger.
    pub fn totals(&self) -> Totals {
        let ledger = self.store.ledger();
        Totals {
            total_count: ledger.total_count(),
            reviewed_count: ledger.reviewed_count(),
        }
    }

    /// Reviewed items for export, ordered by key.
    pub fn report_rows(&self) -> Vec<ReportRow> {
        report::report_rows(self.store.ledger())
    }

    /// Count for `key`, zero when never touched.
    pub fn current(&self, key: &ItemKey) -> Count {
        self.store.current(key)
    }

    /// Reviewed flag for `key`.
    pub fn is_reviewed(&self, key: &ItemKey) -> bool {
        self.store.is_reviewed(key)
    }

    /// Ledger entry for `key`, if any.
    pub fn entry(&self, key: &ItemKey) -> Option<LedgerEntry> {
        self.store.ledger().get(key).copied()
    }

    /// Currently selected key.
    pub fn selected(&self) -> Option<&ItemKey> {
        self.selected.as_ref()
    }

    /// Catalog row of the selected item.
    pub fn selected_item(&self) -> Option<&CatalogItem> {
        self.selected.as_ref().and_then(|k| self.catalog.get(k))
    }

    /// Message of the last command.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Load problem reported at startup, if any.
    pub fn startup_warning(&self) -> Option<&str> {
        self.startup_warning.as_deref()
    }

    /// Number of operations that can be undone.
    pub fn undo_depth(&self) -> usize {
        self.store.undo_len()
    }

    /// Shared catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Underlying store.
    pub fn store(&self) -> &TallyStore {
        &self.store
    }

    /// Where snapshots are written.
    pub fn storage_location(&self) -> String {
        self.sink.describe()
    }

    fn try_apply_delta(&mut self, delta: Delta) -> Result<CommandOutcome, SessionError> {
        let key = self.selected_key()?;
        if delta == 0 {
            return Err(ValidationError::ZeroQuantity.into());
        }
        let committed = self.store.apply(&key, delta)?;
        let status = format!(
            "{key}: {delta:+} (now {})",
            format_count(committed.count)
        );
        self.persist(status, committed)
    }

    fn pack_delta(&self, pack: PackId) -> Result<Delta, SessionError> {
        let key = self.selected_key()?;
        let brand = self.brand_of(&key);
        packs::resolve(&brand)
            .magnitude(pack)
            .and_then(|n| Delta::try_from(n).ok())
            .ok_or_else(|| ValidationError::PackUnavailable { pack, brand }.into())
    }

    fn persist(&mut self, status: String, committed: Committed) -> Result<CommandOutcome, SessionError> {
        let snapshot = self.store.export_snapshot();
        match self.sink.save(&snapshot) {
            Ok(()) => {
                tracing::debug!(
                    key = %committed.record.key,
                    kind = ?committed.record.kind,
                    delta = committed.record.delta,
                    count = committed.count,
                    "tally committed"
                );
                Ok(CommandOutcome {
                    status,
                    record: Some(committed.record),
                    count: committed.count,
                })
            }
            Err(source) => {
                tracing::error!(location = %self.sink.describe(), "failed to save tally: {source}");
                Err(SessionError::NotDurable { status, source })
            }
        }
    }

    fn finish(&mut self, res: Result<CommandOutcome, SessionError>) -> Result<CommandOutcome, SessionError> {
        self.status = match &res {
            Ok(outcome) => outcome.status.clone(),
            Err(err) => err.to_string(),
        };
        res
    }

    fn selected_key(&self) -> Result<ItemKey, ValidationError> {
        self.selected.clone().ok_or(ValidationError::NoSelection)
    }

    fn brand_of(&self, key: &ItemKey) -> String {
        self.catalog
            .get(key)
            .map(|item| item.brand.clone())
            .unwrap_or_else(|| key.brand().to_string())
    }
}

/// Parses operator quantity text, ignoring thousands separators.
///
/// Accepts `,` `.` `_` `'` and whitespace as separators. Every group after
/// the first must hold exactly three digits, so `2.5` is refused rather
/// than read as 25. Empty, non-numeric and zero input is rejected.
pub fn parse_quantity(text: &str) -> Result<Count, ValidationError> {
    let invalid = || ValidationError::InvalidQuantity(text.to_string());
    let mut groups = text
        .trim()
        .split(|c: char| matches!(c, ',' | '.' | '_' | '\'') || c.is_whitespace());
    let mut digits = groups.next().unwrap_or_default().to_string();
    for group in groups {
        if group.len() != 3 {
            return Err(invalid());
        }
        digits.push_str(group);
    }
    match digits.parse::<Count>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid()),
    }
}

/// Formats a count with `,` thousands separators.
pub fn format_count(n: Count) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn text_delta(text: &str) -> Result<Delta, SessionError> {
    let n = parse_quantity(text)?;
    Delta::try_from(n).map_err(|_| ValidationError::InvalidQuantity(text.to_string()).into())
}
