//! Inventory tally ledger with single-step undo and write-through persistence.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::TallyStore`]:
//! ```
//! use tallylog::{core::store::TallyStore, types::ItemKey};
//!
//! let mut store = TallyStore::new();
//! let key = ItemKey::new("A", "samson", "Foo").expect("key");
//! assert_eq!(key.as_str(), "A | SAMSON | Foo");
//!
//! store.apply(&key, 2700).expect("apply");
//! assert_eq!(store.current(&key), 2700);
//! assert!(store.apply(&key, -3000).is_err());
//!
//! store.undo().expect("undo");
//! assert_eq!(store.current(&key), 0);
//! assert!(!store.is_reviewed(&key));
//! ```
//!
//! Operator session with a JSON snapshot file:
//! ```no_run
//! use std::sync::Arc;
//!
//! use tallylog::{
//!     catalog::{Catalog, CatalogItem},
//!     config::SessionConfig,
//!     packs::PackId,
//!     session::Session,
//! };
//!
//! let catalog = Catalog::new([CatalogItem {
//!     code: "3035".to_string(),
//!     brand: "SAMSON".to_string(),
//!     name: "Blue rolls".to_string(),
//! }])
//! .expect("catalog");
//! let key = catalog.iter().next().map(|(k, _)| k.clone()).expect("item");
//!
//! let mut session = Session::open(&SessionConfig::from_env(), Arc::new(catalog)).expect("open");
//! session.select(&key).expect("select");
//! session.apply_named_pack(PackId::Case).expect("case");
//! session.add_text("1,250").expect("text");
//! println!("{}", session.status());
//! ```
#![warn(missing_docs)]

/// Read-only catalog boundary.
pub mod catalog;
/// Session configuration and backend selection.
pub mod config;
/// Core in-memory ledger, history and undo engine.
pub mod core;
/// Operation records kept for undo.
pub mod op;
/// Brand pack-size resolution.
pub mod packs;
/// Snapshot persistence abstraction with JSON-file and SQLite stores.
#[allow(missing_docs)]
pub mod persist;
/// Flat export rows.
pub mod report;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Operator command handling.
pub mod session;
/// Shared primitive types and item keys.
pub mod types;
