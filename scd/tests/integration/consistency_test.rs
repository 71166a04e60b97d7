use scd::merge::{Scd1MergeEngine, Scd2MergeEngine};
use scd::snapshot::{Snapshot, SnapshotLoader};
use scd::store::memory::MemoryStore;
use scd::store::{Scd1Store, Scd2Store};
use scd::test_utils::fixtures::{change, customer, customer_batch, customer_schema, ts};
use scd::test_utils::history::assert_contiguous;
use scd::types::{Cell, EntityId, RawChangeRow};
use scd_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn late_change_leaves_both_targets_on_the_newest_state() {
    init_test_tracing();
    let store = MemoryStore::new();
    let scd1 = Scd1MergeEngine::new(customer_schema(), store.clone());
    let scd2 = Scd2MergeEngine::new(customer_schema(), store.clone());

    for batch in [
        customer_batch(vec![change(1, "I", "2023-01-01", "A", "", "X")]),
        customer_batch(vec![change(1, "U", "2023-01-05", "C", "", "X")]),
    ] {
        scd1.merge(&batch).await.unwrap();
        scd2.merge(&batch).await.unwrap();
    }

    let late = customer_batch(vec![change(1, "U", "2023-01-03", "B", "", "X")]);
    let summaries = [
        scd1.merge(&late).await.unwrap(),
        scd2.merge(&late).await.unwrap(),
    ];

    for summary in &summaries {
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.records_applied, 0);
    }

    let scd1_rows = store.get_all_scd1_records().await.unwrap();
    let scd2_current = store.get_current_scd2_versions().await.unwrap();
    assert_eq!(scd1_rows.len(), 1);
    assert_eq!(scd2_current.len(), 1);
    assert_eq!(scd1_rows[0].attributes, customer("C", "", "X"));
    assert_eq!(scd1_rows[0].attributes, scd2_current[0].attributes);
    assert_eq!(scd1_rows[0].change_ts, ts("2023-01-05"));
    assert_eq!(scd2_current[0].effective_from, ts("2023-01-05"));
}

#[tokio::test(flavor = "multi_thread")]
async fn changes_continue_the_history_of_a_loaded_snapshot() {
    init_test_tracing();
    let store = MemoryStore::new();
    let snapshot = Snapshot::parse(
        &customer_schema(),
        &[
            RawChangeRow::new()
                .with("customer_id", "1")
                .with("name", "A")
                .with("city", "X")
                .with("created_at", "2023-01-01"),
            RawChangeRow::new()
                .with("customer_id", "2")
                .with("name", "B")
                .with("city", "X")
                .with("created_at", "2023-01-02")
                .with("updated_at", "2023-01-03"),
        ],
    )
    .unwrap();

    let loader = SnapshotLoader::new(store.clone());
    let scd1_loaded = loader.load_scd1(&snapshot).await.unwrap();
    let scd2_loaded = loader.load_scd2(&snapshot).await.unwrap();
    assert_eq!(scd1_loaded.inserted, 2);
    assert_eq!(scd2_loaded.inserted, 2);

    let batch = customer_batch(vec![change(2, "U", "2023-02-01", "B", "", "Y")]);
    Scd1MergeEngine::new(customer_schema(), store.clone())
        .merge(&batch)
        .await
        .unwrap();
    Scd2MergeEngine::new(customer_schema(), store.clone())
        .merge(&batch)
        .await
        .unwrap();

    let scd1_rows = store.get_all_scd1_records().await.unwrap();
    assert_eq!(scd1_rows[0].created_at, Some(ts("2023-01-01")));
    assert_eq!(scd1_rows[0].updated_at, None);
    assert_eq!(scd1_rows[1].attributes, customer("B", "", "Y"));
    assert_eq!(scd1_rows[1].created_at, Some(ts("2023-01-02")));

    let versions = store.get_scd2_versions(&[EntityId(2)]).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].effective_from, ts("2023-01-02"));
    assert_eq!(versions[0].effective_to, Some(ts("2023-02-01")));
    assert_eq!(versions[1].attributes, customer("B", "", "Y"));
    assert_contiguous(&versions, EntityId(2));
}

#[tokio::test(flavor = "multi_thread")]
async fn emptied_text_opens_a_new_version() {
    init_test_tracing();
    let engine = Scd2MergeEngine::new(customer_schema(), MemoryStore::new());
    let mut cleared = change(1, "U", "2023-01-02", "A", "", "X");
    cleared.insert("email", None);

    engine
        .merge(&customer_batch(vec![
            change(1, "I", "2023-01-01", "A", "", "X").with("email", ""),
        ]))
        .await
        .unwrap();
    let summary = engine.merge(&customer_batch(vec![cleared])).await.unwrap();

    let versions = engine.store().get_all_scd2_versions().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].attributes.values()[1], Cell::from(""));
    assert_eq!(versions[1].attributes.values()[1], Cell::Null);
}
