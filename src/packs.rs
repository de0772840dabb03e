//! Brand pack sizes used for quick increments.

use serde::{Deserialize, Serialize};

use crate::types::Count;

/// Named quick-increment pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackId {
    /// A single roll.
    Roll,
    /// A quarter of a case.
    QuarterCase,
    /// Half of a case.
    HalfCase,
    /// A full case.
    Case,
}

impl PackId {
    /// All packs in display order.
    pub const ALL: [PackId; 4] = [
        PackId::Roll,
        PackId::QuarterCase,
        PackId::HalfCase,
        PackId::Case,
    ];

    /// Operator-facing label.
    pub fn label(self) -> &'static str {
        match self {
            PackId::Roll => "Roll",
            PackId::QuarterCase => "1/4 case",
            PackId::HalfCase => "1/2 case",
            PackId::Case => "Case",
        }
    }
}

/// Roll and case sizes for one brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSizes {
    /// Units per roll.
    pub roll: Count,
    /// Units per case.
    pub case: Count,
}

impl PackSizes {
    /// `case / 4`, rounded down.
    pub fn quarter_case(&self) -> Count {
        self.case / 4
    }

    /// `case / 2`, rounded down.
    pub fn half_case(&self) -> Count {
        self.case / 2
    }

    /// Size of `pack`.
    pub fn size_of(&self, pack: PackId) -> Count {
        match pack {
            PackId::Roll => self.roll,
            PackId::QuarterCase => self.quarter_case(),
            PackId::HalfCase => self.half_case(),
            PackId::Case => self.case,
        }
    }
}

/// Result of a brand lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packs {
    /// The brand has known pack sizes.
    Available(PackSizes),
    /// Unknown brand; quick increments are disabled.
    Unavailable,
}

impl Packs {
    /// Magnitude for `pack`, or `None` when the pack is disabled.
    pub fn magnitude(&self, pack: PackId) -> Option<Count> {
        match self {
            Packs::Available(sizes) => Some(sizes.size_of(pack)).filter(|n| *n > 0),
            Packs::Unavailable => None,
        }
    }

    /// Roll, quarter, half and case magnitudes; all zero when unavailable.
    pub fn magnitudes(&self) -> [Count; 4] {
        PackId::ALL.map(|p| self.magnitude(p).unwrap_or(0))
    }

    /// True when the brand has pack sizes.
    pub fn is_available(&self) -> bool {
        matches!(self, Packs::Available(_))
    }
}

const PACK_TABLE: &[(&str, PackSizes)] = &[
    ("SAMSON", PackSizes { roll: 150, case: 2700 }),
    ("RAW", PackSizes { roll: 100, case: 2400 }),
    ("OCB", PackSizes { roll: 50, case: 1200 }),
    ("ZIGZAG", PackSizes { roll: 24, case: 600 }),
];

/// Looks up pack sizes for `brand`, ignoring case and surrounding space.
pub fn resolve(brand: &str) -> Packs {
    let brand = brand.trim().to_uppercase();
    PACK_TABLE
        .iter()
        .find(|(name, _)| *name == brand)
        .map(|(_, sizes)| Packs::Available(*sizes))
        .unwrap_or(Packs::Unavailable)
}

/// Brands with pack sizes.
pub fn known_brands() -> impl Iterator<Item = &'static str> {
    PACK_TABLE.iter().map(|(name, _)| *name)
}
