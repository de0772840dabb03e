//! Shared primitive types and the ledger item key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Accumulated, never-negative item count.
pub type Count = u64;
/// Signed quantity change applied to a count.
pub type Delta = i64;
/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

/// Separator placed between `code`, `brand` and `name` in an [`ItemKey`].
pub const KEY_SEPARATOR: &str = " | ";

/// Reasons an [`ItemKey`] cannot be built from its parts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// A required part was empty after trimming.
    #[error("item {0} must not be empty")]
    EmptyPart(&'static str),
}

/// Ledger lookup key composed of `code | BRAND | name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Builds a key from catalog parts, trimming each and uppercasing `brand`.
    pub fn new(code: &str, brand: &str, name: &str) -> Result<Self, KeyError> {
        let code = code.trim();
        let brand = brand.trim();
        let name = name.trim();
        if code.is_empty() {
            return Err(KeyError::EmptyPart("code"));
        }
        if brand.is_empty() {
            return Err(KeyError::EmptyPart("brand"));
        }
        if name.is_empty() {
            return Err(KeyError::EmptyPart("name"));
        }
        Ok(Self(format!(
            "{code}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{name}",
            brand.to_uppercase()
        )))
    }

    /// Wraps an already composed key, e.g. one restored from a snapshot.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the composed key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key back into `(code, brand, name)`.
    ///
    /// Keys that were not composed with [`KEY_SEPARATOR`] come back as the
    /// whole text in `code` with empty `brand` and `name`.
    pub fn parts(&self) -> (&str, &str, &str) {
        let mut it = self.0.splitn(3, KEY_SEPARATOR);
        match (it.next(), it.next(), it.next()) {
            (Some(code), Some(brand), Some(name)) => (code, brand, name),
            _ => (self.0.as_str(), "", ""),
        }
    }

    /// Brand component of the key.
    pub fn brand(&self) -> &str {
        self.parts().1
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(value: &str) -> Self {
        Self::from_raw(value)
    }
}
