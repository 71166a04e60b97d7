use scd::error::ErrorKind;
use scd::snapshot::SnapshotLoader;
use scd::source::ChangeSource;
use scd::store::{Scd1Store, Scd2Store};
use scd::test_utils::fixtures::{change, customer, customer_schema, delete, ts};
use scd::types::{Cell, EntityId, Operation};
use scd_postgres::source::PostgresChangeSource;
use scd_postgres::store::PostgresScdStore;
use scd_postgres::tables::{create_tables, drop_stage_table, drop_tables};
use scd_postgres::test_utils::{TEST_DATABASE_SCHEMA, TestDatabase};
use scd_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn staged_rows_are_read_back_in_staging_order() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let source = PostgresChangeSource::new(database.pool.clone(), database.tables.clone());

    source
        .stage(&[
            change(1, "I", "2023-07-02 10:00:00", "A", "a@x.io", "X"),
            change(1, "U", "2023-07-02 10:00:00", "A", "a@x.io", "Y"),
            delete(2, "2023-07-03"),
        ])
        .await
        .unwrap();

    let batch = source.read_batch(&customer_schema()).await.unwrap();
    let latest = batch.latest_per_entity();

    assert_eq!(batch.len(), 3);
    assert_eq!(latest[0].entity_id, EntityId(1));
    assert_eq!(latest[0].attributes, customer("A", "a@x.io", "Y"));
    assert_eq!(latest[1].operation, Operation::Delete);
    assert_eq!(latest[1].change_ts, ts("2023-07-03"));
    assert_eq!(latest[1].updated_at, None);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_operation_rejects_the_staged_batch() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let source = PostgresChangeSource::new(database.pool.clone(), database.tables.clone());

    source
        .stage(&[
            change(1, "I", "2023-07-01", "A", "", "X"),
            change(2, "MERGE", "2023-07-01", "B", "", "X"),
        ])
        .await
        .unwrap();

    let err = source.read_batch(&customer_schema()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedRecord);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_empties_the_stage() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let source = PostgresChangeSource::new(database.pool.clone(), database.tables.clone());
    source
        .stage(&[change(1, "I", "2023-07-01", "A", "", "X")])
        .await
        .unwrap();

    source.clear().await.unwrap();

    assert!(source.read_changes().await.unwrap().is_empty());

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_tables_can_be_recreated() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let source = PostgresChangeSource::new(database.pool.clone(), database.tables.clone());
    let store = PostgresScdStore::new(database.pool.clone(), database.tables.clone());

    drop_stage_table(&database.pool, &database.tables)
        .await
        .unwrap();
    let err = source.read_changes().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);

    create_tables(&database.pool, &database.tables)
        .await
        .unwrap();
    assert!(source.read_changes().await.unwrap().is_empty());

    drop_tables(&database.pool, &database.tables).await.unwrap();
    let err = store.get_all_scd1_records().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_text_is_staged_verbatim() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let source = PostgresChangeSource::new(database.pool.clone(), database.tables.clone());

    source
        .stage(&[change(1, "I", "2023-07-01", "A", "", "X").with("email", "")])
        .await
        .unwrap();

    let batch = source.read_batch(&customer_schema()).await.unwrap();

    assert_eq!(batch.records()[0].attributes.values()[1], Cell::from(""));

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_table_is_loaded_into_both_targets() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    sqlx::query(&format!(
        "create table {TEST_DATABASE_SCHEMA}.customers (customer_id bigint, name text, \
         email text, city text, created_at timestamp, updated_at timestamp)"
    ))
    .execute(&database.pool)
    .await
    .unwrap();
    sqlx::query(&format!(
        "insert into {TEST_DATABASE_SCHEMA}.customers values \
         (2, 'B', null, 'X', '2023-01-02', '2023-01-03'), \
         (1, 'A', 'a@x.io', 'X', '2023-01-01', null)"
    ))
    .execute(&database.pool)
    .await
    .unwrap();

    let tables = database.tables.clone().with_snapshot_table("customers");
    let source = PostgresChangeSource::new(database.pool.clone(), tables.clone());
    let store = PostgresScdStore::new(database.pool.clone(), tables);

    let snapshot = source.read_snapshot().await.unwrap();
    let loader = SnapshotLoader::new(store.clone());
    loader.load_scd1(&snapshot).await.unwrap();
    loader.load_scd2(&snapshot).await.unwrap();

    let rows = store.get_all_scd1_records().await.unwrap();
    let versions = store.get_current_scd2_versions().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].attributes, customer("A", "a@x.io", "X"));
    assert_eq!(rows[1].updated_at, Some(ts("2023-01-03")));
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].effective_from, ts("2023-01-02"));
    assert_eq!(versions[1].created_at, Some(ts("2023-01-02")));

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_requires_a_snapshot_table() {
    init_test_tracing();
    let database = TestDatabase::spawn().await;
    let source = PostgresChangeSource::new(database.pool.clone(), database.tables.clone());

    let err = source.read_snapshot().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);

    database.cleanup().await;
}
