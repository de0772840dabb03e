//! Read-only catalog handed in by the ingestion collaborator.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::types::{ItemKey, KeyError};

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Item code.
    pub code: String,
    /// Uppercase brand.
    pub brand: String,
    /// Display name.
    pub name: String,
}

impl CatalogItem {
    /// Ledger key for this item.
    pub fn key(&self) -> Result<ItemKey, KeyError> {
        ItemKey::new(&self.code, &self.brand, &self.name)
    }
}

/// Ordered, immutable list of catalog items.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<(ItemKey, CatalogItem)>,
    by_key: HashMap<ItemKey, usize>,
}

impl Catalog {
    /// Normalizes and indexes `items`, keeping the first of any duplicate key.
    pub fn new(items: impl IntoIterator<Item = CatalogItem>) -> Result<Self, KeyError> {
        let mut catalog = Self::default();
        for item in items {
            let key = item.key()?;
            if catalog.by_key.contains_key(&key) {
                continue;
            }
            let item = CatalogItem {
                code: item.code.trim().to_string(),
                brand: item.brand.trim().to_uppercase(),
                name: item.name.trim().to_string(),
            };
            catalog.by_key.insert(key.clone(), catalog.items.len());
            catalog.items.push((key, item));
        }
        Ok(catalog)
    }

    /// Item for `key`, if cataloged.
    pub fn get(&self, key: &ItemKey) -> Option<&CatalogItem> {
        self.by_key.get(key).map(|idx| &self.items[*idx].1)
    }

    /// First item whose code equals `code`.
    pub fn find_code(&self, code: &str) -> Option<(&ItemKey, &CatalogItem)> {
        let code = code.trim();
        self.items
            .iter()
            .find(|(_, item)| item.code == code)
            .map(|(k, item)| (k, item))
    }

    /// Items in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemKey, &CatalogItem)> {
        self.items.iter().map(|(k, item)| (k, item))
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
