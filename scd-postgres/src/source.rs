use std::sync::Arc;

use scd::bail;
use scd::error::{ErrorKind, ScdResult};
use scd::snapshot::Snapshot;
use scd::source::ChangeSource;
use scd::types::{
    CHANGE_TS_COLUMN_NAME, CREATED_AT_COLUMN_NAME, OPERATION_COLUMN_NAME, RawChangeRow,
    UPDATED_AT_COLUMN_NAME,
};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::error::store_error;
use crate::tables::ScdTables;

/// Change source reading the stage table.
///
/// Every column is read as text and parsed by the batch, so the stage accepts the same values as
/// any other source. Rows are returned in the order they were staged.
#[derive(Debug, Clone)]
pub struct PostgresChangeSource {
    pool: PgPool,
    tables: Arc<ScdTables>,
}

impl PostgresChangeSource {
    pub fn new(pool: PgPool, tables: ScdTables) -> Self {
        Self {
            pool,
            tables: Arc::new(tables),
        }
    }

    /// Appends rows to the stage in one transaction.
    ///
    /// Absent columns are staged as nulls. Text attributes are staged verbatim, blank values of
    /// any other column as nulls.
    pub async fn stage(&self, rows: &[RawChangeRow]) -> ScdResult<u64> {
        let sql = self.tables.insert_stage_sql();
        let schema = self.tables.entity_schema();

        let mut transaction = self.pool.begin().await.map_err(store_error)?;
        for row in rows {
            let mut query =
                sqlx::query(&sql).bind(row.get(schema.entity_column()).map(str::to_string));
            for column in schema.attribute_columns() {
                query = query.bind(
                    row.attribute(&column.name, column.data_type)
                        .map(str::to_string),
                );
            }
            for column in [
                OPERATION_COLUMN_NAME,
                CHANGE_TS_COLUMN_NAME,
                CREATED_AT_COLUMN_NAME,
                UPDATED_AT_COLUMN_NAME,
            ] {
                query = query.bind(row.get(column).map(str::to_string));
            }
            query
                .execute(&mut *transaction)
                .await
                .map_err(store_error)?;
        }
        transaction.commit().await.map_err(store_error)?;

        debug!(rows = rows.len(), stage = %self.tables.stage_table(), "staged change rows");

        Ok(rows.len() as u64)
    }

    /// Removes every staged row.
    pub async fn clear(&self) -> ScdResult<()> {
        sqlx::query(&self.tables.truncate_stage_sql())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        info!(stage = %self.tables.stage_table(), "cleared stage table");

        Ok(())
    }

    /// Reads and validates the snapshot table.
    ///
    /// Fails with [`ErrorKind::ConfigError`] if no snapshot table is set.
    pub async fn read_snapshot(&self) -> ScdResult<Snapshot> {
        let Some(sql) = self.tables.select_snapshot_sql() else {
            bail!(
                ErrorKind::ConfigError,
                "No snapshot table configured",
                "set `tables.snapshot_table` to load a snapshot"
            );
        };

        let rows = self
            .fetch_text_rows(&sql, &self.tables.snapshot_columns())
            .await?;
        debug!(rows = rows.len(), "read snapshot table");

        Snapshot::parse(self.tables.entity_schema(), &rows)
    }

    async fn fetch_text_rows(&self, sql: &str, columns: &[String]) -> ScdResult<Vec<RawChangeRow>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        let mut raw_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut raw_row = RawChangeRow::new();
            for column in columns {
                let value: Option<String> = row.try_get(column.as_str()).map_err(store_error)?;
                raw_row.insert(column.clone(), value);
            }
            raw_rows.push(raw_row);
        }

        Ok(raw_rows)
    }
}

impl ChangeSource for PostgresChangeSource {
    async fn read_changes(&self) -> ScdResult<Vec<RawChangeRow>> {
        let changes = self
            .fetch_text_rows(&self.tables.select_stage_sql(), &self.tables.stage_columns())
            .await?;

        debug!(rows = changes.len(), stage = %self.tables.stage_table(), "read stage table");

        Ok(changes)
    }
}
