use std::{sync::Arc, time::Duration};

use tallylog::{
    catalog::{Catalog, CatalogItem},
    core::store::{StoreError, TallySnapshot},
    packs::PackId,
    persist::{MemoryStore, PersistError, PersistResult, SnapshotStore},
    runtime::{
        events::TallyEvent,
        handle::{spawn_session, RuntimeConfig, RuntimeError},
    },
    session::{Session, SessionError, ValidationError},
    types::ItemKey,
};

fn catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::new([
            CatalogItem {
                code: "3035".to_string(),
                brand: "SAMSON".to_string(),
                name: "Blue rolls".to_string(),
            },
            CatalogItem {
                code: "7777".to_string(),
                brand: "ACME".to_string(),
                name: "Generic".to_string(),
            },
        ])
        .expect("catalog"),
    )
}

fn samson() -> ItemKey {
    ItemKey::new("3035", "SAMSON", "Blue rolls").expect("key")
}

struct BrokenSink;

impl SnapshotStore for BrokenSink {
    fn save(&mut self, _snapshot: &TallySnapshot) -> PersistResult<()> {
        Err(PersistError::Message("read-only storage".to_string()))
    }

    fn load(&self) -> PersistResult<Option<TallySnapshot>> {
        Ok(None)
    }

    fn describe(&self) -> String {
        "broken".to_string()
    }
}

async fn next_event(sub: &mut tokio::sync::broadcast::Receiver<TallyEvent>) -> TallyEvent {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event")
        .expect("recv")
}

#[tokio::test]
async fn runtime_commands_queries_and_events_ordered() {
    let sink = MemoryStore::new();
    let session = Session::with_store(catalog(), Box::new(sink.clone()), 2000);
    let handle = spawn_session(session, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    handle.select(samson()).await.expect("select");
    handle.apply_named_pack(PackId::Case).await.expect("case");
    handle.add_text("1,000").await.expect("text");
    handle.mark_empty().await.expect("empty");
    handle.undo().await.expect("undo");

    assert_eq!(next_event(&mut sub).await, TallyEvent::Selected { key: samson() });
    assert_eq!(
        next_event(&mut sub).await,
        TallyEvent::Counted { key: samson(), count: 2700 }
    );
    assert_eq!(
        next_event(&mut sub).await,
        TallyEvent::Counted { key: samson(), count: 3700 }
    );
    assert_eq!(next_event(&mut sub).await, TallyEvent::MarkedEmpty { key: samson() });
    assert_eq!(
        next_event(&mut sub).await,
        TallyEvent::Undone { key: samson(), count: 0 }
    );

    assert_eq!(handle.current(samson()).await.expect("current"), 0);
    assert_eq!(handle.totals().await.expect("totals").reviewed_count, 0);
    assert!(handle.report_rows().await.expect("rows").is_empty());

    let quick = handle.quick_amounts().await.expect("quick");
    assert_eq!(quick.brand, "SAMSON");

    handle.shutdown().await.expect("shutdown");
    assert!(matches!(
        handle.totals().await,
        Err(RuntimeError::ChannelClosed)
    ));
}

#[tokio::test]
async fn rejections_come_back_without_events() {
    let session = Session::with_store(catalog(), Box::new(MemoryStore::new()), 2000);
    let handle = spawn_session(session, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let err = handle.apply_delta(1).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Session(SessionError::Validation(ValidationError::NoSelection))
    ));

    let err = handle.undo().await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Session(SessionError::Store(StoreError::NothingToUndo))
    ));

    handle
        .select(ItemKey::new("7777", "ACME", "Generic").expect("key"))
        .await
        .expect("select");
    let err = handle.apply_named_pack(PackId::Roll).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Session(SessionError::Validation(ValidationError::PackUnavailable { .. }))
    ));

    assert!(matches!(next_event(&mut sub).await, TallyEvent::Selected { .. }));
    assert!(sub.try_recv().is_err());

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_write_surfaces_error_and_event() {
    let session = Session::with_store(catalog(), Box::new(BrokenSink), 2000);
    let handle = spawn_session(session, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    handle.select(samson()).await.expect("select");
    let err = handle.apply_delta(7).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Session(SessionError::NotDurable { .. })
    ));

    assert!(matches!(next_event(&mut sub).await, TallyEvent::Selected { .. }));
    assert!(matches!(next_event(&mut sub).await, TallyEvent::NotDurable { .. }));

    // The change stays applied in memory.
    assert_eq!(handle.current(samson()).await.expect("current"), 7);

    handle.shutdown().await.expect("shutdown");
}
