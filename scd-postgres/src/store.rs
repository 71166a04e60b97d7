use std::sync::Arc;

use scd::bail;
use scd::error::{ErrorKind, ScdResult};
use scd::store::{Scd1Mutation, Scd1Store, Scd2Mutation, Scd2Store};
use scd::types::{
    CREATED_AT_COLUMN_NAME, EFFECTIVE_FROM_COLUMN_NAME, EFFECTIVE_TO_COLUMN_NAME, EntityId,
    CHANGE_TS_COLUMN_NAME, IS_CURRENT_COLUMN_NAME, SURROGATE_KEY_COLUMN_NAME, Scd1Record,
    Scd2Record, SurrogateKey, UPDATED_AT_COLUMN_NAME,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::cells::{bind_attributes, decode_attributes};
use crate::error::store_error;
use crate::tables::ScdTables;

/// SCD1 and SCD2 store backed by Postgres tables.
///
/// Every mutation list runs in one transaction, so a failure leaves both tables as they were.
/// The pool is owned by the caller and shared by cloning.
#[derive(Debug, Clone)]
pub struct PostgresScdStore {
    pool: PgPool,
    tables: Arc<ScdTables>,
}

impl PostgresScdStore {
    pub fn new(pool: PgPool, tables: ScdTables) -> Self {
        Self {
            pool,
            tables: Arc::new(tables),
        }
    }

    pub fn tables(&self) -> &ScdTables {
        &self.tables
    }

    fn entity_id(&self, row: &PgRow) -> sqlx::Result<EntityId> {
        Ok(EntityId(
            row.try_get(self.tables.entity_schema().entity_column())?,
        ))
    }

    fn decode_scd1(&self, row: &PgRow) -> sqlx::Result<Scd1Record> {
        Ok(Scd1Record {
            entity_id: self.entity_id(row)?,
            attributes: decode_attributes(row, self.tables.entity_schema())?,
            change_ts: row.try_get(CHANGE_TS_COLUMN_NAME)?,
            created_at: row.try_get(CREATED_AT_COLUMN_NAME)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN_NAME)?,
        })
    }

    fn decode_scd2(&self, row: &PgRow) -> sqlx::Result<Scd2Record> {
        Ok(Scd2Record {
            surrogate_key: SurrogateKey(row.try_get(SURROGATE_KEY_COLUMN_NAME)?),
            entity_id: self.entity_id(row)?,
            attributes: decode_attributes(row, self.tables.entity_schema())?,
            effective_from: row.try_get(EFFECTIVE_FROM_COLUMN_NAME)?,
            effective_to: row.try_get(EFFECTIVE_TO_COLUMN_NAME)?,
            is_current: row.try_get(IS_CURRENT_COLUMN_NAME)?,
            created_at: row.try_get(CREATED_AT_COLUMN_NAME)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN_NAME)?,
        })
    }

    async fn fetch_scd1(
        &self,
        sql: &str,
        entity_ids: Option<&[EntityId]>,
    ) -> ScdResult<Vec<Scd1Record>> {
        let mut query = sqlx::query(sql);
        if let Some(entity_ids) = entity_ids {
            query = query.bind(raw_ids(entity_ids));
        }

        let rows = query.fetch_all(&self.pool).await.map_err(store_error)?;
        rows.iter()
            .map(|row| self.decode_scd1(row))
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(store_error)
    }

    async fn fetch_scd2(
        &self,
        sql: &str,
        entity_ids: Option<&[EntityId]>,
    ) -> ScdResult<Vec<Scd2Record>> {
        let mut query = sqlx::query(sql);
        if let Some(entity_ids) = entity_ids {
            query = query.bind(raw_ids(entity_ids));
        }

        let rows = query.fetch_all(&self.pool).await.map_err(store_error)?;
        rows.iter()
            .map(|row| self.decode_scd2(row))
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(store_error)
    }
}

fn raw_ids(entity_ids: &[EntityId]) -> Vec<i64> {
    entity_ids.iter().map(|entity_id| entity_id.0).collect()
}

impl Scd1Store for PostgresScdStore {
    async fn get_scd1_records(&self, entity_ids: &[EntityId]) -> ScdResult<Vec<Scd1Record>> {
        if entity_ids.is_empty() {
            return Ok(vec![]);
        }

        self.fetch_scd1(&self.tables.select_scd1_by_ids_sql(), Some(entity_ids))
            .await
    }

    async fn get_all_scd1_records(&self) -> ScdResult<Vec<Scd1Record>> {
        self.fetch_scd1(&self.tables.select_all_scd1_sql(), None).await
    }

    async fn apply_scd1_mutations(&self, mutations: Vec<Scd1Mutation>) -> ScdResult<u64> {
        if mutations.is_empty() {
            return Ok(0);
        }

        let schema = self.tables.entity_schema();
        let insert_sql = self.tables.insert_scd1_sql();
        let update_sql = self.tables.update_scd1_sql();
        let delete_sql = self.tables.delete_scd1_sql();

        let mut transaction = self.pool.begin().await.map_err(store_error)?;
        let mut applied = 0;
        for mutation in &mutations {
            let result = match mutation {
                Scd1Mutation::Insert(record) => {
                    let query = sqlx::query(&insert_sql).bind(record.entity_id.0);
                    bind_attributes(query, schema, &record.attributes)
                        .bind(record.change_ts)
                        .bind(record.created_at)
                        .bind(record.updated_at)
                        .execute(&mut *transaction)
                        .await
                }
                Scd1Mutation::Update {
                    entity_id,
                    attributes,
                    change_ts,
                    updated_at,
                } => {
                    let query = sqlx::query(&update_sql).bind(entity_id.0);
                    bind_attributes(query, schema, attributes)
                        .bind(*change_ts)
                        .bind(*updated_at)
                        .execute(&mut *transaction)
                        .await
                }
                Scd1Mutation::Delete(entity_id) => {
                    sqlx::query(&delete_sql)
                        .bind(entity_id.0)
                        .execute(&mut *transaction)
                        .await
                }
            }
            .map_err(store_error)?;

            // Dropping the transaction rolls it back.
            if result.rows_affected() != 1 {
                bail!(
                    ErrorKind::StoreQueryFailed,
                    "SCD1 mutation did not match exactly one row",
                    format!("entity {}", mutation.entity_id())
                );
            }
            applied += 1;
        }
        transaction.commit().await.map_err(store_error)?;

        debug!(applied, table = %self.tables.scd1_table(), "applied scd1 mutations");

        Ok(applied)
    }
}

impl Scd2Store for PostgresScdStore {
    async fn get_scd2_versions(&self, entity_ids: &[EntityId]) -> ScdResult<Vec<Scd2Record>> {
        if entity_ids.is_empty() {
            return Ok(vec![]);
        }

        self.fetch_scd2(&self.tables.select_scd2_by_ids_sql(), Some(entity_ids))
            .await
    }

    async fn get_current_scd2_versions(&self) -> ScdResult<Vec<Scd2Record>> {
        self.fetch_scd2(&self.tables.select_current_scd2_sql(), None)
            .await
    }

    async fn get_all_scd2_versions(&self) -> ScdResult<Vec<Scd2Record>> {
        self.fetch_scd2(&self.tables.select_all_scd2_sql(), None)
            .await
    }

    async fn apply_scd2_mutations(&self, mutations: Vec<Scd2Mutation>) -> ScdResult<u64> {
        if mutations.is_empty() {
            return Ok(0);
        }

        let schema = self.tables.entity_schema();
        let close_sql = self.tables.close_scd2_sql();
        let insert_sql = self.tables.insert_scd2_sql();

        let mut transaction = self.pool.begin().await.map_err(store_error)?;
        let mut applied = 0;
        for mutation in &mutations {
            match mutation {
                Scd2Mutation::Close {
                    surrogate_key,
                    effective_to,
                    updated_at,
                } => {
                    let result = sqlx::query(&close_sql)
                        .bind(surrogate_key.0)
                        .bind(*effective_to)
                        .bind(*updated_at)
                        .execute(&mut *transaction)
                        .await
                        .map_err(store_error)?;

                    if result.rows_affected() != 1 {
                        bail!(
                            ErrorKind::StoreQueryFailed,
                            "Closed version is missing or no longer current",
                            format!("surrogate key {surrogate_key}")
                        );
                    }
                }
                Scd2Mutation::Append(version) => {
                    let query = sqlx::query(&insert_sql).bind(version.entity_id.0);
                    bind_attributes(query, schema, &version.attributes)
                        .bind(version.effective_from)
                        .bind(version.effective_to)
                        .bind(version.is_current())
                        .bind(version.created_at)
                        .bind(version.updated_at)
                        .execute(&mut *transaction)
                        .await
                        .map_err(store_error)?;
                }
            }
            applied += 1;
        }
        transaction.commit().await.map_err(store_error)?;

        debug!(applied, table = %self.tables.scd2_table(), "applied scd2 mutations");

        Ok(applied)
    }
}
