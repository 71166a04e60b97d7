use scd::merge::Scd1MergeEngine;
use scd::store::Scd1Store;
use scd::store::memory::MemoryStore;
use scd::test_utils::fixtures::{change, customer, customer_batch, customer_schema, delete, ts};
use scd::types::EntityId;
use scd_telemetry::tracing::init_test_tracing;

fn engine() -> Scd1MergeEngine<MemoryStore> {
    Scd1MergeEngine::new(customer_schema(), MemoryStore::new())
}

#[tokio::test(flavor = "multi_thread")]
async fn reapplying_a_batch_changes_nothing() {
    init_test_tracing();
    let engine = engine();
    let batch = customer_batch(vec![
        change(1, "I", "2023-07-01 10:00:00", "Asha", "asha@x.io", "Pune"),
        change(2, "I", "2023-07-01 10:00:00", "Ben", "", "Oslo"),
        change(2, "U", "2023-07-02 10:00:00", "Ben", "ben@x.io", "Oslo"),
    ]);

    let first = engine.merge(&batch).await.unwrap();
    let after_first = engine.store().get_all_scd1_records().await.unwrap();
    let second = engine.merge(&batch).await.unwrap();
    let after_second = engine.store().get_all_scd1_records().await.unwrap();

    assert_eq!(first.inserted, 2);
    assert_eq!(second.records_applied, 0);
    assert_eq!(second.unchanged, 2);
    assert!(second.is_balanced());
    assert_eq!(after_first, after_second);
}

#[tokio::test(flavor = "multi_thread")]
async fn latest_change_of_an_entity_wins() {
    init_test_tracing();
    let engine = engine();

    let summary = engine
        .merge(&customer_batch(vec![
            change(4, "U", "2023-07-02 10:00:00", "Dev", "dev@x.io", "Y"),
            change(4, "U", "2023-07-01 10:00:00", "Dev", "dev@x.io", "X"),
        ]))
        .await
        .unwrap();

    let rows = engine.store().get_all_scd1_records().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].attributes, customer("Dev", "dev@x.io", "Y"));
    assert_eq!(rows[0].updated_at, Some(ts("2023-07-02 10:00:00")));
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_overwrites_everything_but_created_at() {
    init_test_tracing();
    let engine = engine();
    engine
        .merge(&customer_batch(vec![change(
            1,
            "I",
            "2023-07-01 10:00:00",
            "Asha",
            "asha@x.io",
            "Pune",
        )]))
        .await
        .unwrap();

    let summary = engine
        .merge(&customer_batch(vec![change(
            1,
            "U",
            "2023-07-05 10:00:00",
            "Asha",
            "",
            "Goa",
        )]))
        .await
        .unwrap();

    let rows = engine.store().get_scd1_records(&[EntityId(1)]).await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(rows[0].attributes, customer("Asha", "", "Goa"));
    assert_eq!(rows[0].created_at, Some(ts("2023-07-01 10:00:00")));
    assert_eq!(rows[0].updated_at, Some(ts("2023-07-05 10:00:00")));
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_of_existing_entity_is_an_upsert() {
    init_test_tracing();
    let engine = engine();
    engine
        .merge(&customer_batch(vec![change(
            1, "I", "2023-07-01", "Asha", "", "Pune",
        )]))
        .await
        .unwrap();

    let summary = engine
        .merge(&customer_batch(vec![change(
            1, "I", "2023-07-02", "Asha", "", "Goa",
        )]))
        .await
        .unwrap();

    let rows = engine.store().get_all_scd1_records().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].attributes, customer("Asha", "", "Goa"));
    assert_eq!(rows[0].created_at, Some(ts("2023-07-01")));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_the_row() {
    init_test_tracing();
    let engine = engine();
    engine
        .merge(&customer_batch(vec![
            change(3, "I", "2023-07-01", "Chen", "", "Rome"),
            change(5, "I", "2023-07-01", "Eve", "", "Lima"),
        ]))
        .await
        .unwrap();

    let summary = engine
        .merge(&customer_batch(vec![delete(3, "2023-07-03")]))
        .await
        .unwrap();

    let rows = engine.store().get_all_scd1_records().await.unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].entity_id, EntityId(5));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_of_absent_entity_is_skipped() {
    init_test_tracing();
    let engine = engine();

    let summary = engine
        .merge(&customer_batch(vec![delete(9, "2023-07-03")]))
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.records_applied, 0);
    assert!(engine.store().get_all_scd1_records().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_then_reinsert_in_one_batch_keeps_the_row() {
    init_test_tracing();
    let engine = engine();
    engine
        .merge(&customer_batch(vec![change(
            1, "I", "2023-07-01", "Asha", "", "Pune",
        )]))
        .await
        .unwrap();

    engine
        .merge(&customer_batch(vec![
            change(1, "I", "2023-07-03", "Asha", "", "Goa"),
            delete(1, "2023-07-02"),
        ]))
        .await
        .unwrap();

    let rows = engine.store().get_all_scd1_records().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].attributes, customer("Asha", "", "Goa"));
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_then_delete_in_one_batch_leaves_no_row() {
    init_test_tracing();
    let engine = engine();

    engine
        .merge(&customer_batch(vec![
            change(1, "I", "2023-07-01", "Asha", "", "Pune"),
            delete(1, "2023-07-02"),
        ]))
        .await
        .unwrap();

    assert!(engine.store().get_all_scd1_records().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn one_row_per_live_entity_after_many_batches() {
    init_test_tracing();
    let engine = engine();
    let batches = vec![
        vec![
            change(1, "I", "2023-07-01", "A", "", "X"),
            change(2, "I", "2023-07-01", "B", "", "X"),
            change(3, "I", "2023-07-01", "C", "", "X"),
        ],
        vec![
            change(2, "U", "2023-07-02", "B", "", "Y"),
            delete(3, "2023-07-02"),
            change(4, "U", "2023-07-02", "D", "", "Y"),
        ],
        vec![
            change(3, "I", "2023-07-03", "C", "", "Z"),
            delete(1, "2023-07-03"),
            delete(1, "2023-07-04"),
        ],
    ];

    for rows in batches {
        let summary = engine.merge(&customer_batch(rows)).await.unwrap();
        assert!(summary.is_balanced());
    }

    let ids: Vec<_> = engine
        .store()
        .get_all_scd1_records()
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.entity_id)
        .collect();
    assert_eq!(ids, vec![EntityId(2), EntityId(3), EntityId(4)]);
}
