use scd::error::ErrorKind;
use scd::merge::{Scd1MergeEngine, Scd2MergeEngine};
use scd::store::{Scd1Mutation, Scd1Store, Scd2Mutation, Scd2Store};
use scd::test_utils::fixtures::{change, customer, customer_batch, customer_schema, delete, ts};
use scd::test_utils::history::{assert_contiguous, assert_valid_histories, history_of};
use scd::types::{EntityId, Scd1Record};
use scd_postgres::store::PostgresScdStore;
use scd_postgres::test_utils::TestDatabase;
use scd_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn scd1_merge_overwrites_and_deletes() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let store = PostgresScdStore::new(database.pool.clone(), database.tables.clone());
    let engine = Scd1MergeEngine::new(customer_schema(), store.clone());

    engine
        .merge(&customer_batch(vec![
            change(1, "I", "2023-07-01", "A", "a@x.io", "X"),
            change(2, "I", "2023-07-01", "B", "", "X"),
        ]))
        .await
        .unwrap();
    let summary = engine
        .merge(&customer_batch(vec![
            change(1, "U", "2023-07-02", "A", "a@x.io", "Y"),
            delete(2, "2023-07-02"),
        ]))
        .await
        .unwrap();

    let records = store.get_all_scd1_records().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attributes, customer("A", "a@x.io", "Y"));
    assert_eq!(records[0].created_at, Some(ts("2023-07-01")));
    assert_eq!(records[0].updated_at, Some(ts("2023-07-02")));

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn scd2_merge_builds_contiguous_history() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let store = PostgresScdStore::new(database.pool.clone(), database.tables.clone());
    let engine = Scd2MergeEngine::new(customer_schema(), store.clone());

    engine
        .merge(&customer_batch(vec![change(1, "I", "2023-07-01", "A", "", "X")]))
        .await
        .unwrap();
    engine
        .merge(&customer_batch(vec![
            change(1, "U", "2023-07-02", "A", "", "Y"),
            change(1, "U", "2023-07-03", "A", "", "Z"),
        ]))
        .await
        .unwrap();

    let versions = store.get_all_scd2_versions().await.unwrap();
    let history = history_of(&versions, EntityId(1));
    let current = store.get_current_scd2_versions().await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].attributes, customer("A", "", "Z"));
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].surrogate_key, history[2].surrogate_key);
    assert_contiguous(&versions, EntityId(1));
    assert_valid_histories(&versions);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_scd1_mutation_rolls_back_the_whole_list() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let store = PostgresScdStore::new(database.pool.clone(), database.tables.clone());
    let record = Scd1Record {
        entity_id: EntityId(1),
        attributes: customer("A", "", "X"),
        change_ts: ts("2023-07-01"),
        created_at: Some(ts("2023-07-01")),
        updated_at: Some(ts("2023-07-01")),
    };
    store
        .apply_scd1_mutations(vec![Scd1Mutation::Insert(record.clone())])
        .await
        .unwrap();

    let err = store
        .apply_scd1_mutations(vec![
            Scd1Mutation::Delete(EntityId(1)),
            Scd1Mutation::Delete(EntityId(2)),
        ])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);
    assert_eq!(store.get_all_scd1_records().await.unwrap(), vec![record]);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn closing_a_closed_version_fails() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let store = PostgresScdStore::new(database.pool.clone(), database.tables.clone());
    let engine = Scd2MergeEngine::new(customer_schema(), store.clone());
    engine
        .merge(&customer_batch(vec![
            change(1, "I", "2023-07-01", "A", "", "X"),
            delete(1, "2023-07-02"),
        ]))
        .await
        .unwrap();
    let closed = store.get_all_scd2_versions().await.unwrap().remove(0);

    let err = store
        .apply_scd2_mutations(vec![Scd2Mutation::Close {
            surrogate_key: closed.surrogate_key,
            effective_to: ts("2023-07-03"),
            updated_at: None,
        }])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);
    assert_eq!(
        store.get_all_scd2_versions().await.unwrap()[0].effective_to,
        Some(ts("2023-07-02"))
    );

    database.cleanup().await;
}
