//! Flat rows for the export collaborator.

use serde::{Deserialize, Serialize};

use crate::{core::ledger::QuantityLedger, types::Count};

/// Column headers matching [`ReportRow`] field order.
pub const REPORT_COLUMNS: [&str; 5] = ["code", "brand", "name", "count", "reviewed"];

/// One exported ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Item code.
    pub code: String,
    /// Item brand.
    pub brand: String,
    /// Item name.
    pub name: String,
    /// Accumulated count.
    pub count: Count,
    /// Reviewed flag.
    pub reviewed: bool,
}

/// Reviewed ledger entries as rows, ordered by item key.
pub fn report_rows(ledger: &QuantityLedger) -> Vec<ReportRow> {
    let mut entries: Vec<_> = ledger.iter().filter(|(_, e)| e.reviewed).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(key, entry)| {
            let (code, brand, name) = key.parts();
            ReportRow {
                code: code.to_string(),
                brand: brand.to_string(),
                name: name.to_string(),
                count: entry.count,
                reviewed: entry.reviewed,
            }
        })
        .collect()
}
