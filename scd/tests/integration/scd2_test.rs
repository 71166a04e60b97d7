use scd::error::ErrorKind;
use scd::merge::Scd2MergeEngine;
use scd::store::memory::MemoryStore;
use scd::store::{Scd2Mutation, Scd2Store};
use scd::test_utils::fixtures::{change, customer, customer_batch, customer_schema, delete, ts};
use scd::test_utils::history::{assert_contiguous, assert_valid_histories, history_of};
use scd::types::{EntityId, NewScd2Version};
use scd_telemetry::tracing::init_test_tracing;

fn engine() -> Scd2MergeEngine<MemoryStore> {
    Scd2MergeEngine::new(customer_schema(), MemoryStore::new())
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_update_closes_and_reopens() {
    init_test_tracing();
    let engine = engine();
    engine
        .merge(&customer_batch(vec![change(
            1, "I", "2023-07-01", "A", "", "X",
        )]))
        .await
        .unwrap();

    let summary = engine
        .merge(&customer_batch(vec![change(
            1, "U", "2023-07-02", "A", "", "Y",
        )]))
        .await
        .unwrap();

    let versions = engine.store().get_all_scd2_versions().await.unwrap();
    let history = history_of(&versions, EntityId(1));
    assert_eq!(summary.updated, 1);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].attributes, customer("A", "", "X"));
    assert_eq!(history[0].effective_to, Some(ts("2023-07-02")));
    assert!(!history[0].is_current);
    assert_eq!(history[1].attributes, customer("A", "", "Y"));
    assert_eq!(history[1].effective_from, ts("2023-07-02"));
    assert_eq!(history[1].effective_to, None);
    assert!(history[1].is_current);
    assert_contiguous(&versions, EntityId(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_update_keeps_the_open_version() {
    init_test_tracing();
    let engine = engine();

    let summary = engine
        .merge(&customer_batch(vec![
            change(2, "I", "2023-07-01", "B", "b@x.io", "X"),
            change(2, "U", "2023-07-02", "B", "b@x.io", "X"),
        ]))
        .await
        .unwrap();

    let history = history_of(&engine.store().get_all_scd2_versions().await.unwrap(), EntityId(2));
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].effective_from, ts("2023-07-01"));
    assert!(history[0].is_current);
}

#[tokio::test(flavor = "multi_thread")]
async fn reapplying_an_update_creates_no_version() {
    init_test_tracing();
    let engine = engine();
    let batch = customer_batch(vec![
        change(1, "I", "2023-07-01", "A", "", "X"),
        change(1, "U", "2023-07-02", "A", "", "Y"),
    ]);

    engine.merge(&batch).await.unwrap();
    let before = engine.store().get_all_scd2_versions().await.unwrap();
    let summary = engine
        .merge(&customer_batch(vec![change(
            1, "U", "2023-07-02", "A", "", "Y",
        )]))
        .await
        .unwrap();
    let after = engine.store().get_all_scd2_versions().await.unwrap();

    assert_eq!(summary.unchanged, 1);
    assert_eq!(before, after);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_closes_without_successor() {
    init_test_tracing();
    let engine = engine();
    engine
        .merge(&customer_batch(vec![change(
            3, "I", "2023-07-01", "C", "", "Rome",
        )]))
        .await
        .unwrap();

    let summary = engine
        .merge(&customer_batch(vec![delete(3, "2023-07-03")]))
        .await
        .unwrap();

    let history = history_of(&engine.store().get_all_scd2_versions().await.unwrap(), EntityId(3));
    assert_eq!(summary.deleted, 1);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].effective_to, Some(ts("2023-07-03")));
    assert!(!history[0].is_current);
    assert!(engine.store().get_current_scd2_versions().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_without_open_version_is_skipped() {
    init_test_tracing();
    let engine = engine();

    let summary = engine
        .merge(&customer_batch(vec![delete(3, "2023-07-03")]))
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(engine.store().get_all_scd2_versions().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn two_updates_in_one_batch_replay_in_order() {
    init_test_tracing();
    let engine = engine();

    engine
        .merge(&customer_batch(vec![
            change(4, "U", "2023-07-02", "D", "", "Y"),
            change(4, "U", "2023-07-01", "D", "", "X"),
            change(5, "U", "2023-07-02", "E", "", "X"),
            change(5, "U", "2023-07-01", "E", "", "X"),
        ]))
        .await
        .unwrap();

    let versions = engine.store().get_all_scd2_versions().await.unwrap();
    let changed = history_of(&versions, EntityId(4));
    let identical = history_of(&versions, EntityId(5));

    assert_eq!(changed.len(), 2);
    assert_eq!(changed[0].attributes, customer("D", "", "X"));
    assert_eq!(changed[0].effective_to, Some(ts("2023-07-02")));
    assert_eq!(changed[1].attributes, customer("D", "", "Y"));
    assert!(changed[1].is_current);
    assert_eq!(identical.len(), 1);
    assert_valid_histories(&versions);
    assert_contiguous(&versions, EntityId(4));
}

#[tokio::test(flavor = "multi_thread")]
async fn version_opened_and_closed_in_one_batch_is_stored_closed() {
    init_test_tracing();
    let engine = engine();

    let summary = engine
        .merge(&customer_batch(vec![
            change(6, "I", "2023-07-01", "F", "", "X"),
            delete(6, "2023-07-04"),
        ]))
        .await
        .unwrap();

    let history = history_of(&engine.store().get_all_scd2_versions().await.unwrap(), EntityId(6));
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].effective_to, Some(ts("2023-07-04")));
    assert!(!history[0].is_current);
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_while_open_is_handled_as_update() {
    init_test_tracing();
    let engine = engine();

    let summary = engine
        .merge(&customer_batch(vec![
            change(1, "I", "2023-07-01", "A", "", "X"),
            change(1, "I", "2023-07-02", "A", "", "X"),
            change(1, "I", "2023-07-03", "A", "", "Z"),
        ]))
        .await
        .unwrap();

    let versions = engine.store().get_all_scd2_versions().await.unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(history_of(&versions, EntityId(1)).len(), 2);
    assert_eq!(engine.store().get_current_scd2_versions().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn reinsert_after_delete_opens_a_fresh_version_after_a_gap() {
    init_test_tracing();
    let engine = engine();
    engine
        .merge(&customer_batch(vec![
            change(7, "I", "2023-07-01", "G", "", "X"),
            delete(7, "2023-07-02"),
        ]))
        .await
        .unwrap();

    let summary = engine
        .merge(&customer_batch(vec![change(
            7, "U", "2023-07-05", "G", "", "X",
        )]))
        .await
        .unwrap();

    let versions = engine.store().get_all_scd2_versions().await.unwrap();
    let history = history_of(&versions, EntityId(7));
    assert_eq!(summary.inserted, 1);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].effective_to, Some(ts("2023-07-02")));
    assert_eq!(history[1].effective_from, ts("2023-07-05"));
    assert!(history[1].is_current);
    assert_valid_histories(&versions);
}

#[tokio::test(flavor = "multi_thread")]
async fn changes_older_than_history_are_skipped() {
    init_test_tracing();
    let engine = engine();
    engine
        .merge(&customer_batch(vec![
            change(1, "I", "2023-07-01", "A", "", "X"),
            change(1, "U", "2023-07-05", "A", "", "Y"),
        ]))
        .await
        .unwrap();
    let before = engine.store().get_all_scd2_versions().await.unwrap();

    let summary = engine
        .merge(&customer_batch(vec![
            change(1, "U", "2023-07-03", "A", "", "Late"),
            delete(1, "2023-07-04"),
        ]))
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.records_applied, 0);
    assert!(summary.is_balanced());
    assert_eq!(engine.store().get_all_scd2_versions().await.unwrap(), before);
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupted_history_halts_the_batch() {
    init_test_tracing();
    let engine = engine();
    let overlapping = |from: &str, to: &str| {
        Scd2Mutation::Append(NewScd2Version {
            entity_id: EntityId(1),
            attributes: customer("A", "", "X"),
            effective_from: ts(from),
            effective_to: Some(ts(to)),
            created_at: None,
            updated_at: None,
        })
    };
    engine
        .store()
        .apply_scd2_mutations(vec![
            overlapping("2023-07-01", "2023-07-10"),
            overlapping("2023-07-05", "2023-07-06"),
        ])
        .await
        .unwrap();

    let err = engine
        .merge(&customer_batch(vec![
            change(1, "I", "2023-07-20", "A", "", "Y"),
            change(2, "I", "2023-07-20", "B", "", "Y"),
        ]))
        .await
        .unwrap_err();

    let versions = engine.store().get_all_scd2_versions().await.unwrap();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(versions.len(), 2);
    assert!(history_of(&versions, EntityId(2)).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn histories_stay_valid_across_batches() {
    init_test_tracing();
    let engine = engine();
    let batches = vec![
        vec![
            change(1, "I", "2023-07-01", "A", "", "X"),
            change(2, "I", "2023-07-01", "B", "", "X"),
        ],
        vec![
            change(1, "U", "2023-07-02", "A", "a@x.io", "X"),
            change(1, "U", "2023-07-03", "A", "a@x.io", "Y"),
            delete(2, "2023-07-02"),
            change(3, "U", "2023-07-02", "C", "", "X"),
        ],
        vec![
            change(2, "I", "2023-07-04", "B", "", "Z"),
            change(1, "U", "2023-07-04", "A", "a@x.io", "Y"),
            delete(3, "2023-07-04"),
        ],
    ];

    for rows in batches {
        let summary = engine.merge(&customer_batch(rows)).await.unwrap();
        assert!(summary.is_balanced());
    }

    let versions = engine.store().get_all_scd2_versions().await.unwrap();
    assert_valid_histories(&versions);
    assert_contiguous(&versions, EntityId(1));
    assert_eq!(history_of(&versions, EntityId(1)).len(), 3);
    assert_eq!(history_of(&versions, EntityId(2)).len(), 2);
    assert_eq!(history_of(&versions, EntityId(3)).len(), 1);

    let current: Vec<_> = engine
        .store()
        .get_current_scd2_versions()
        .await
        .unwrap()
        .into_iter()
        .map(|version| version.entity_id)
        .collect();
    assert_eq!(current, vec![EntityId(1), EntityId(2)]);
}
