use scd::batch::ChangeBatch;
use scd::error::ErrorKind;
use scd::merge::{Scd1MergeEngine, Scd2MergeEngine};
use scd::source::{ChangeSource, MemoryChangeSource};
use scd::store::memory::MemoryStore;
use scd::store::{Scd1Store, Scd2Store};
use scd::test_utils::faulty_store::FaultyStore;
use scd::test_utils::fixtures::{change, customer_batch, customer_schema, delete};
use scd::types::RawChangeRow;
use scd_telemetry::tracing::init_test_tracing;

fn seed_rows() -> Vec<RawChangeRow> {
    vec![
        change(1, "I", "2023-07-01", "A", "", "X"),
        change(2, "I", "2023-07-01", "B", "", "X"),
        change(3, "I", "2023-07-01", "C", "", "X"),
    ]
}

fn follow_up_rows() -> Vec<RawChangeRow> {
    vec![
        change(1, "U", "2023-07-02", "A", "", "Y"),
        delete(2, "2023-07-02"),
        change(4, "I", "2023-07-02", "D", "", "Y"),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_row_rejects_the_whole_batch() {
    init_test_tracing();
    let source = MemoryChangeSource::new(follow_up_rows());
    source
        .push([
            RawChangeRow::new()
                .with("customer_id", "5")
                .with("op", "U"),
            change(6, "X", "2023-07-02", "F", "", "Y"),
        ])
        .await;

    let err = source.read_batch(&customer_schema()).await.unwrap_err();

    assert_eq!(err.errors().map(<[_]>::len), Some(2));
    assert!(
        err.kinds()
            .iter()
            .all(|kind| *kind == ErrorKind::MalformedRecord)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_scd1_apply_leaves_the_table_untouched() {
    init_test_tracing();
    let store = FaultyStore::wrap(MemoryStore::new());
    let engine = Scd1MergeEngine::new(customer_schema(), store.clone());
    engine.merge(&customer_batch(seed_rows())).await.unwrap();
    let before = store.get_all_scd1_records().await.unwrap();

    store.fail_next_apply();
    let err = engine
        .merge(&customer_batch(follow_up_rows()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert_eq!(store.get_all_scd1_records().await.unwrap(), before);

    let summary = engine
        .merge(&customer_batch(follow_up_rows()))
        .await
        .unwrap();
    assert_eq!(summary.records_applied, 3);
    assert_eq!(store.apply_calls(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_scd2_apply_leaves_history_untouched() {
    init_test_tracing();
    let store = FaultyStore::wrap(MemoryStore::new());
    let engine = Scd2MergeEngine::new(customer_schema(), store.clone());
    engine.merge(&customer_batch(seed_rows())).await.unwrap();
    let before = store.get_all_scd2_versions().await.unwrap();

    store.fail_next_apply();
    let err = engine
        .merge(&customer_batch(follow_up_rows()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert_eq!(store.get_all_scd2_versions().await.unwrap(), before);

    let summary = engine
        .merge(&customer_batch(follow_up_rows()))
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(store.get_all_scd2_versions().await.unwrap().len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_read_aborts_before_any_write() {
    init_test_tracing();
    let store = FaultyStore::wrap(MemoryStore::new());
    let scd1 = Scd1MergeEngine::new(customer_schema(), store.clone());
    let scd2 = Scd2MergeEngine::new(customer_schema(), store.clone());

    store.fail_reads(true);
    let batch = customer_batch(seed_rows());
    let scd1_err = scd1.merge(&batch).await.unwrap_err();
    let scd2_err = scd2.merge(&batch).await.unwrap_err();
    store.fail_reads(false);

    assert_eq!(scd1_err.kind(), ErrorKind::StoreUnavailable);
    assert_eq!(scd2_err.kind(), ErrorKind::StoreUnavailable);
    assert_eq!(store.apply_calls(), 0);
    assert!(store.get_all_scd1_records().await.unwrap().is_empty());
    assert!(store.get_all_scd2_versions().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn engines_share_one_batch_and_agree_on_final_state() {
    init_test_tracing();
    let store = MemoryStore::new();
    let scd1 = Scd1MergeEngine::new(customer_schema(), store.clone());
    let scd2 = Scd2MergeEngine::new(customer_schema(), store.clone());
    let batch = ChangeBatch::concat([
        customer_batch(seed_rows()),
        customer_batch(follow_up_rows()),
    ]);

    scd1.merge(&batch).await.unwrap();
    scd2.merge(&batch).await.unwrap();

    let overwrite = store.get_all_scd1_records().await.unwrap();
    let current = store.get_current_scd2_versions().await.unwrap();
    assert_eq!(overwrite.len(), current.len());
    for (row, version) in overwrite.iter().zip(&current) {
        assert_eq!(row.entity_id, version.entity_id);
        assert_eq!(row.attributes, version.attributes);
    }
}
