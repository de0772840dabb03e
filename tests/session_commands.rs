use std::{
    fs,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tempfile::TempDir;

use tallylog::{
    catalog::{Catalog, CatalogItem},
    config::{Backend, SessionConfig},
    core::store::{StoreError, TallySnapshot},
    packs::{self, PackId, Packs},
    persist::{MemoryStore, PersistError, PersistResult, SnapshotStore},
    report::REPORT_COLUMNS,
    session::{format_count, parse_quantity, Session, SessionError, ValidationError},
    types::ItemKey,
};

fn item(code: &str, brand: &str, name: &str) -> CatalogItem {
    CatalogItem {
        code: code.to_string(),
        brand: brand.to_string(),
        name: name.to_string(),
    }
}

fn catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::new([
            item("3035", "samson", "Blue rolls"),
            item("4011", "RAW", "Classic"),
            item("7777", "ACME", "Generic"),
        ])
        .expect("catalog"),
    )
}

fn samson() -> ItemKey {
    ItemKey::new("3035", "SAMSON", "Blue rolls").unwrap()
}

fn acme() -> ItemKey {
    ItemKey::new("7777", "ACME", "Generic").unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn memory_session(sink: &MemoryStore) -> Session {
    Session::with_store(catalog(), Box::new(sink.clone()), 2000)
}

struct FlakySink {
    inner: MemoryStore,
    fail: Arc<AtomicBool>,
}

impl SnapshotStore for FlakySink {
    fn save(&mut self, snapshot: &TallySnapshot) -> PersistResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistError::Message("disk full".to_string()));
        }
        self.inner.save(snapshot)
    }

    fn load(&self) -> PersistResult<Option<TallySnapshot>> {
        self.inner.load()
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

#[test]
fn commands_require_a_selection() {
    let sink = MemoryStore::new();
    let mut session = memory_session(&sink);

    let err = session.apply_delta(5).unwrap_err();
    assert!(matches!(err, SessionError::Validation(ValidationError::NoSelection)));
    assert!(matches!(
        session.mark_empty().unwrap_err(),
        SessionError::Validation(ValidationError::NoSelection)
    ));
    assert!(session.quick_amounts().is_err());
    assert_eq!(session.status(), "select an item first");
    assert!(sink.payload().is_none(), "rejected commands must not save");
}

#[test]
fn select_rejects_items_outside_the_catalog() {
    let mut session = memory_session(&MemoryStore::new());
    let stray = ItemKey::from_raw("0 | NOPE | Missing");
    let err = session.select(&stray).unwrap_err();
    assert!(matches!(err, SessionError::Validation(ValidationError::UnknownItem(_))));
    assert!(session.selected().is_none());
    assert!(session.selected_item().is_none());

    let (key, found) = session.catalog().find_code(" 4011 ").expect("code lookup");
    let key = key.clone();
    assert_eq!(found.brand, "RAW");
    assert!(session.catalog().find_code("0000").is_none());

    session.select(&key).unwrap();
    assert_eq!(session.selected_item().map(|i| i.name.as_str()), Some("Classic"));
    assert_eq!(session.storage_location(), "memory");
}

#[test]
fn apply_and_undo_write_through_on_every_command() {
    let sink = MemoryStore::new();
    let mut session = memory_session(&sink);
    session.select(&samson()).unwrap();

    let outcome = session.apply_delta(2700).unwrap();
    assert_eq!(outcome.count, 2700);
    assert_eq!(outcome.status, "3035 | SAMSON | Blue rolls: +2700 (now 2,700)");
    let saved = MemoryStore::with_payload(sink.payload().unwrap());
    assert_eq!(saved.load().unwrap().unwrap().entries[&samson()].count, 2700);

    session.undo().unwrap();
    assert_eq!(session.current(&samson()), 0);
    assert!(!session.is_reviewed(&samson()));
    assert!(sink.load().unwrap().unwrap().entries.is_empty());
}

#[test]
fn over_subtraction_is_rejected_and_state_kept() {
    let sink = MemoryStore::new();
    let mut session = memory_session(&sink);
    session.select(&samson()).unwrap();
    session.apply_delta(100).unwrap();
    let saved_before = sink.payload();

    let err = session.apply_delta(-150).unwrap_err();
    assert!(matches!(err, SessionError::Store(StoreError::WouldGoNegative { .. })));
    assert_eq!(session.current(&samson()), 100);
    assert_eq!(session.undo_depth(), 1);
    assert_eq!(sink.payload(), saved_before);
}

#[test]
fn named_packs_use_the_selected_brand() {
    let mut session = memory_session(&MemoryStore::new());
    session.select(&samson()).unwrap();

    session.apply_named_pack(PackId::Case).unwrap();
    session.apply_named_pack(PackId::QuarterCase).unwrap();
    session.apply_named_pack(PackId::HalfCase).unwrap();
    session.apply_named_pack(PackId::Roll).unwrap();
    assert_eq!(session.current(&samson()), 2700 + 675 + 1350 + 150);

    let quick = session.quick_amounts().unwrap();
    assert_eq!(quick.brand, "SAMSON");
    let labels: Vec<_> = quick.amounts.iter().map(|a| a.label.as_str()).collect();
    assert_eq!(labels, ["Roll +150", "1/4 case +675", "1/2 case +1,350", "Case +2,700"]);
}

#[test]
fn unknown_brand_disables_packs() {
    assert_eq!(packs::resolve("ACME"), Packs::Unavailable);
    assert!(!packs::resolve("ACME").is_available());
    assert!(packs::resolve("samson").is_available());
    assert_eq!(packs::resolve("ACME").magnitudes(), [0, 0, 0, 0]);

    let sink = MemoryStore::new();
    let mut session = memory_session(&sink);
    session.select(&acme()).unwrap();

    let err = session.apply_named_pack(PackId::Case).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::PackUnavailable { pack: PackId::Case, .. })
    ));
    assert!(session.entry(&acme()).is_none());
    assert_eq!(session.undo_depth(), 0);
    assert!(sink.payload().is_none());

    let quick = session.quick_amounts().unwrap();
    assert!(quick.amounts.iter().all(|a| a.magnitude.is_none()));
}

#[test]
fn pack_resolution_ignores_case_and_floors_fractions() {
    let Packs::Available(sizes) = packs::resolve(" zigzag ") else {
        panic!("zigzag should have packs");
    };
    assert_eq!(sizes.quarter_case(), 150);
    assert_eq!(sizes.half_case(), 300);
    assert!(packs::known_brands().any(|b| b == "SAMSON"));
}

#[test]
fn text_quantities_strip_separators() {
    assert_eq!(parse_quantity("2,700"), Ok(2700));
    assert_eq!(parse_quantity(" 1.250 "), Ok(1250));
    assert_eq!(parse_quantity("10 000"), Ok(10_000));
    assert!(parse_quantity("").is_err());
    assert!(parse_quantity("0").is_err());
    assert!(parse_quantity("-5").is_err());
    assert!(parse_quantity("abc").is_err());
    assert_eq!(
        parse_quantity("2.5"),
        Err(ValidationError::InvalidQuantity("2.5".to_string()))
    );
    assert!(parse_quantity("1,2").is_err());
    assert!(parse_quantity("12,3456").is_err());
    assert!(parse_quantity("1,,000").is_err());
    assert_eq!(parse_quantity("1_000'000"), Ok(1_000_000));
    assert_eq!(format_count(1_234_567), "1,234,567");
    assert_eq!(format_count(999), "999");

    let mut session = memory_session(&MemoryStore::new());
    session.select(&samson()).unwrap();
    session.add_text("2,700").unwrap();
    session.subtract_text("700").unwrap();
    assert_eq!(session.current(&samson()), 2000);

    let err = session.add_text("zero").unwrap_err();
    assert!(matches!(err, SessionError::Validation(ValidationError::InvalidQuantity(_))));
    assert!(matches!(
        session.apply_delta(0).unwrap_err(),
        SessionError::Validation(ValidationError::ZeroQuantity)
    ));
}

#[test]
fn increments_totals_and_report_rows() {
    let mut session = memory_session(&MemoryStore::new());
    let raw = ItemKey::new("4011", "RAW", "Classic").unwrap();

    session.select(&raw).unwrap();
    session.increment().unwrap();
    session.increment().unwrap();
    session.decrement().unwrap();
    session.select(&samson()).unwrap();
    session.apply_delta(500).unwrap();
    session.select(&acme()).unwrap();
    session.mark_empty().unwrap();

    let totals = session.totals();
    assert_eq!(totals.total_count, 501);
    assert_eq!(totals.reviewed_count, 3);

    let rows = session.report_rows();
    assert_eq!(REPORT_COLUMNS, ["code", "brand", "name", "count", "reviewed"]);
    let flat: Vec<_> = rows
        .iter()
        .map(|r| (r.code.as_str(), r.brand.as_str(), r.count, r.reviewed))
        .collect();
    assert_eq!(
        flat,
        [
            ("3035", "SAMSON", 500, true),
            ("4011", "RAW", 1, true),
            ("7777", "ACME", 0, true),
        ]
    );
}

#[test]
fn reset_all_clears_and_saves() {
    let sink = MemoryStore::new();
    let mut session = memory_session(&sink);
    session.select(&samson()).unwrap();
    session.apply_delta(10).unwrap();

    session.reset_all().unwrap();
    assert_eq!(session.totals().reviewed_count, 0);
    assert_eq!(session.undo_depth(), 0);
    let saved = sink.load().unwrap().unwrap();
    assert!(saved.entries.is_empty());
    assert!(saved.history.is_empty());

    assert!(matches!(
        session.undo().unwrap_err(),
        SessionError::Store(StoreError::NothingToUndo)
    ));
    assert_eq!(session.status(), "nothing to undo");
}

#[test]
fn restart_restores_counts_and_history() {
    let tmp = TempDir::new().expect("tmp");
    for backend in [Backend::Json, Backend::Sqlite] {
        let config = SessionConfig {
            backend,
            ..SessionConfig::in_dir(tmp.path().join(format!("{backend:?}")))
        };

        {
            let mut session = Session::open(&config, catalog()).expect("open");
            assert!(session.startup_warning().is_none());
            session.select(&samson()).unwrap();
            session.apply_delta(500).unwrap();
        }

        let mut session = Session::open(&config, catalog()).expect("reopen");
        assert_eq!(session.current(&samson()), 500);
        assert!(session.is_reviewed(&samson()));
        assert_eq!(session.undo_depth(), 1);

        session.undo().unwrap();
        assert_eq!(session.current(&samson()), 0);
    }
}

#[test]
fn corrupt_snapshot_starts_empty_with_warning() {
    init_tracing();
    let sink = MemoryStore::with_payload("{\"entries\": [broken");
    let mut session = memory_session(&sink);

    assert!(session.startup_warning().is_some());
    assert_eq!(session.status(), session.startup_warning().unwrap());
    assert_eq!(session.totals().reviewed_count, 0);

    session.select(&samson()).unwrap();
    session.apply_delta(3).unwrap();
    assert_eq!(sink.load().unwrap().unwrap().entries[&samson()].count, 3);
}

#[test]
fn failed_save_keeps_change_and_reports_it() {
    init_tracing();
    let fail = Arc::new(AtomicBool::new(false));
    let inner = MemoryStore::new();
    let sink = FlakySink {
        inner: inner.clone(),
        fail: Arc::clone(&fail),
    };
    let mut session = Session::with_store(catalog(), Box::new(sink), 2000);
    session.select(&samson()).unwrap();
    session.apply_delta(10).unwrap();

    fail.store(true, Ordering::SeqCst);
    let err = session.apply_delta(5).unwrap_err();
    assert!(err.mutated());
    assert!(matches!(err, SessionError::NotDurable { .. }));
    assert_eq!(session.current(&samson()), 15);
    assert!(session.status().contains("not saved"));
    assert_eq!(inner.load().unwrap().unwrap().entries[&samson()].count, 10);

    fail.store(false, Ordering::SeqCst);
    session.apply_delta(1).unwrap();
    assert_eq!(inner.load().unwrap().unwrap().entries[&samson()].count, 16);
}

#[test]
fn corrupt_sqlite_database_fails_open_while_json_degrades() {
    init_tracing();
    let tmp = TempDir::new().expect("tmp");
    for backend in [Backend::Json, Backend::Sqlite] {
        let config = SessionConfig {
            backend,
            ..SessionConfig::in_dir(tmp.path().join(format!("{backend:?}")))
        };
        fs::create_dir_all(&config.data_dir).expect("dir");
        fs::write(config.snapshot_path(), "not a tally snapshot ".repeat(64)).expect("write");

        let opened = Session::open(&config, catalog());
        match backend {
            Backend::Json => {
                let session = opened.expect("json backend degrades");
                assert!(session.startup_warning().is_some());
                assert_eq!(session.totals().reviewed_count, 0);
            }
            Backend::Sqlite => {
                assert!(matches!(opened, Err(PersistError::Sqlite(_))));
            }
        }
    }
}
